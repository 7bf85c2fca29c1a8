//! liblouis backend.
//!
//! Shells out to `lou_translate`, which reads text on stdin and writes
//! braille on stdout. With the `unicode.dis` display table the output is
//! already in the Unicode braille block.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::table::BRAILLE_SPACE;
use super::translator::{BrailleTranslator, TranslateError};

/// Translator backed by the liblouis command-line tool
#[derive(Debug, Clone)]
pub struct LouisTranslator {
    /// Path to `lou_translate`
    binary_path: String,

    /// Literary table, e.g. `en-ueb-g2.ctb`
    literary_table: String,

    /// Math table, e.g. `nemeth.ctb`
    math_table: String,
}

impl Default for LouisTranslator {
    fn default() -> Self {
        Self::new("lou_translate", "en-ueb-g2.ctb", "nemeth.ctb")
    }
}

impl LouisTranslator {
    pub fn new(
        binary_path: impl Into<String>,
        literary_table: impl Into<String>,
        math_table: impl Into<String>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            literary_table: literary_table.into(),
            math_table: math_table.into(),
        }
    }

    /// Check that the binary runs at all
    pub fn health_check(&self) -> Result<(), TranslateError> {
        Command::new(&self.binary_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| TranslateError::Unavailable(format!("{}: {}", self.binary_path, e)))?;
        Ok(())
    }

    fn translate(&self, table: &str, input: &str) -> Result<String, TranslateError> {
        let tables = format!("unicode.dis,{}", table);
        debug!(binary = %self.binary_path, %tables, chars = input.len(), "Running lou_translate");

        let mut child = Command::new(&self.binary_path)
            .args(["--forward", &tables])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TranslateError::Unavailable(format!("{}: {}", self.binary_path, e)))?;

        // lou_translate works line by line; keep the input on one line
        let single_line = input.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(single_line.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslateError::Failed(format!(
                "{} exited with {}: {}",
                table,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| TranslateError::Failed("lou_translate output is not UTF-8".into()))?;

        Ok(stdout
            .trim_end_matches(['\n', '\r'])
            .replace(' ', &BRAILLE_SPACE.to_string()))
    }
}

impl BrailleTranslator for LouisTranslator {
    fn name(&self) -> &str {
        "liblouis"
    }

    fn grade2(&self, text: &str) -> Result<String, TranslateError> {
        self.translate(&self.literary_table, text)
    }

    fn nemeth(&self, math: &str) -> Result<String, TranslateError> {
        self.translate(&self.math_table, math)
    }
}

//! Artifact cache: translations, story decks and braille exports.
//!
//! Inserts are a single `INSERT ... ON CONFLICT DO NOTHING` on the row's key
//! tuple, so concurrent duplicate executions of a job leave exactly the first
//! writer's row behind. Each insert reports whether it created the row.

use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{
    BrailleExport, BrailleFormat, BrailleScope, ContentTranslation, PlannedSlide, StoredAsset,
    StoryAudio, StoryPlan, StorySlide,
};

use super::store::{from_ms, now_ms, parse_json, Store, StoreError};

impl Store {
    // ------------------------------------------------------------------
    // Translations
    // ------------------------------------------------------------------

    pub fn insert_translation(&self, translation: &ContentTranslation) -> Result<bool, StoreError> {
        let payload_json = serde_json::to_string(&translation.translated_payload)?;
        let changed = self.conn().execute(
            "INSERT INTO content_translations
                 (content_key, version, locale, translated_payload_json, translated_hash, model, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (content_key, version, locale) DO NOTHING",
            params![
                translation.content_key,
                translation.version,
                translation.locale,
                payload_json,
                translation.translated_hash,
                translation.model,
                translation.created_at.timestamp_millis(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_translation(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
    ) -> Result<Option<ContentTranslation>, StoreError> {
        let raw = self
            .conn()
            .query_row(
                "SELECT translated_payload_json, translated_hash, model, created_at_ms
                 FROM content_translations
                 WHERE content_key = ?1 AND version = ?2 AND locale = ?3",
                params![content_key, version, locale],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        raw.map(
            |(payload_json, translated_hash, model, created_at_ms)| -> Result<_, StoreError> {
                Ok(ContentTranslation {
                    content_key: content_key.to_string(),
                    version,
                    locale: locale.to_string(),
                    translated_payload: parse_json(&payload_json)?,
                    translated_hash,
                    model,
                    created_at: from_ms(created_at_ms),
                })
            },
        )
        .transpose()
    }

    // ------------------------------------------------------------------
    // Story decks
    // ------------------------------------------------------------------

    pub fn insert_story_plan(&self, plan: &StoryPlan) -> Result<bool, StoreError> {
        let plan_json = serde_json::to_string(&plan.slides)?;
        let changed = self.conn().execute(
            "INSERT INTO story_plans
                 (content_key, version, locale, title, plan_json, plan_hash, model, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (content_key, version, locale) DO NOTHING",
            params![
                plan.content_key,
                plan.version,
                plan.locale,
                plan.title,
                plan_json,
                plan.plan_hash,
                plan.model,
                plan.created_at.timestamp_millis(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_story_plan(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
    ) -> Result<Option<StoryPlan>, StoreError> {
        let raw = self
            .conn()
            .query_row(
                "SELECT title, plan_json, plan_hash, model, created_at_ms
                 FROM story_plans
                 WHERE content_key = ?1 AND version = ?2 AND locale = ?3",
                params![content_key, version, locale],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        raw.map(|(title, plan_json, plan_hash, model, created_at_ms)| -> Result<_, StoreError> {
            let slides: Vec<PlannedSlide> = serde_json::from_str(&plan_json)?;
            Ok(StoryPlan {
                content_key: content_key.to_string(),
                version,
                locale: locale.to_string(),
                title,
                slides,
                plan_hash,
                model,
                created_at: from_ms(created_at_ms),
            })
        })
        .transpose()
    }

    pub fn insert_story_slide(&self, slide: &StorySlide) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "INSERT INTO story_slides
                 (content_key, version, locale, slide_index, caption, caption_hash,
                  prompt, prompt_hash, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT (content_key, version, locale, slide_index) DO NOTHING",
            params![
                slide.content_key,
                slide.version,
                slide.locale,
                slide.slide_index,
                slide.caption,
                slide.caption_hash,
                slide.prompt,
                slide.prompt_hash,
                slide.created_at.timestamp_millis(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_story_slide(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
        slide_index: i64,
    ) -> Result<Option<StorySlide>, StoreError> {
        let slide = self
            .conn()
            .query_row(
                &format!(
                    "{SLIDE_SELECT} WHERE s.content_key = ?1 AND s.version = ?2
                     AND s.locale = ?3 AND s.slide_index = ?4"
                ),
                params![content_key, version, locale, slide_index],
                slide_from_row,
            )
            .optional()?;
        Ok(slide)
    }

    /// All slides of a deck in order, with any narration attached
    pub fn list_story_slides(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
    ) -> Result<Vec<StorySlide>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SLIDE_SELECT} WHERE s.content_key = ?1 AND s.version = ?2 AND s.locale = ?3
             ORDER BY s.slide_index"
        ))?;
        let slides = stmt
            .query_map(params![content_key, version, locale], slide_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slides)
    }

    /// Attach an image to a slide that has none yet. First writer wins.
    pub fn attach_slide_image(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
        slide_index: i64,
        image: &StoredAsset,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE story_slides
             SET image_url = ?5, image_mime = ?6, image_hash = ?7, updated_at_ms = ?8
             WHERE content_key = ?1 AND version = ?2 AND locale = ?3 AND slide_index = ?4
               AND image_url IS NULL",
            params![
                content_key,
                version,
                locale,
                slide_index,
                image.url,
                image.mime,
                image.hash,
                now_ms(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn insert_story_audio(&self, audio: &StoryAudio) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "INSERT INTO story_audio
                 (content_key, version, locale, slide_index, caption_hash,
                  audio_url, audio_mime, audio_hash, voice, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (content_key, version, locale, slide_index) DO NOTHING",
            params![
                audio.content_key,
                audio.version,
                audio.locale,
                audio.slide_index,
                audio.caption_hash,
                audio.audio.url,
                audio.audio.mime,
                audio.audio.hash,
                audio.voice,
                audio.created_at.timestamp_millis(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_story_audio(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
        slide_index: i64,
    ) -> Result<Option<StoryAudio>, StoreError> {
        let audio = self
            .conn()
            .query_row(
                "SELECT caption_hash, audio_url, audio_mime, audio_hash, voice, created_at_ms
                 FROM story_audio
                 WHERE content_key = ?1 AND version = ?2 AND locale = ?3 AND slide_index = ?4",
                params![content_key, version, locale, slide_index],
                |row| {
                    Ok(StoryAudio {
                        content_key: content_key.to_string(),
                        version,
                        locale: locale.to_string(),
                        slide_index,
                        caption_hash: row.get(0)?,
                        audio: StoredAsset {
                            url: row.get(1)?,
                            mime: row.get(2)?,
                            hash: row.get(3)?,
                        },
                        voice: row.get(4)?,
                        created_at: from_ms(row.get(5)?),
                    })
                },
            )
            .optional()?;
        Ok(audio)
    }

    // ------------------------------------------------------------------
    // Braille
    // ------------------------------------------------------------------

    pub fn insert_braille_export(&self, export: &BrailleExport) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "INSERT INTO braille_exports
                 (content_key, version, locale, scope, format, braille_text, braille_hash, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (content_key, version, locale, scope, format) DO NOTHING",
            params![
                export.content_key,
                export.version,
                export.locale,
                export.scope.to_string(),
                export.format.as_str(),
                export.braille_text,
                export.braille_hash,
                export.created_at.timestamp_millis(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_braille_export(
        &self,
        content_key: &str,
        version: i64,
        locale: &str,
        scope: &BrailleScope,
        format: BrailleFormat,
    ) -> Result<Option<BrailleExport>, StoreError> {
        let export = self
            .conn()
            .query_row(
                "SELECT braille_text, braille_hash, created_at_ms
                 FROM braille_exports
                 WHERE content_key = ?1 AND version = ?2 AND locale = ?3
                   AND scope = ?4 AND format = ?5",
                params![
                    content_key,
                    version,
                    locale,
                    scope.to_string(),
                    format.as_str()
                ],
                |row| {
                    Ok(BrailleExport {
                        content_key: content_key.to_string(),
                        version,
                        locale: locale.to_string(),
                        scope: scope.clone(),
                        format,
                        braille_text: row.get(0)?,
                        braille_hash: row.get(1)?,
                        created_at: from_ms(row.get(2)?),
                    })
                },
            )
            .optional()?;
        Ok(export)
    }
}

const SLIDE_SELECT: &str = "
    SELECT s.content_key, s.version, s.locale, s.slide_index, s.caption, s.caption_hash,
           s.prompt, s.prompt_hash, s.image_url, s.image_mime, s.image_hash,
           s.created_at_ms, s.updated_at_ms, a.audio_url, a.audio_mime, a.audio_hash
    FROM story_slides s
    LEFT JOIN story_audio a
      ON a.content_key = s.content_key AND a.version = s.version
     AND a.locale = s.locale AND a.slide_index = s.slide_index";

fn slide_from_row(row: &Row<'_>) -> rusqlite::Result<StorySlide> {
    Ok(StorySlide {
        content_key: row.get(0)?,
        version: row.get(1)?,
        locale: row.get(2)?,
        slide_index: row.get(3)?,
        caption: row.get(4)?,
        caption_hash: row.get(5)?,
        prompt: row.get(6)?,
        prompt_hash: row.get(7)?,
        image: asset_columns(row, 8)?,
        created_at: from_ms(row.get(11)?),
        updated_at: from_ms(row.get(12)?),
        audio: asset_columns(row, 13)?,
    })
}

/// Three nullable columns (url, mime, hash) starting at `first`
fn asset_columns(row: &Row<'_>, first: usize) -> rusqlite::Result<Option<StoredAsset>> {
    let url: Option<String> = row.get(first)?;
    let mime: Option<String> = row.get(first + 1)?;
    let hash: Option<String> = row.get(first + 2)?;
    Ok(match (url, mime, hash) {
        (Some(url), Some(mime), Some(hash)) => Some(StoredAsset { url, mime, hash }),
        _ => None,
    })
}

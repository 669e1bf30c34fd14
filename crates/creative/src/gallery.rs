//! Result gallery: the current variant set, user selections and favorites,
//! and materializing a variant as a local file.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use campaign_core::RegenerationPolicy;
use chrono::Utc;
use image::ImageFormat;
use tracing::{debug, info};

use crate::error::{CreativeError, CreativeResult};
use crate::types::{GeneratedVariant, Recommendation, RemoteVariant, VariantId};

const DEFAULT_SCORE: u32 = 85;
const DEFAULT_KIND: &str = "AI Generated";

/// Ordered variants of the current result set plus selection state.
///
/// Selections and favorites only ever reference ids present in `variants`.
#[derive(Debug, Default)]
pub struct ResultGallery {
    variants: Vec<GeneratedVariant>,
    selected: BTreeSet<VariantId>,
    favorites: BTreeSet<VariantId>,
}

impl ResultGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the variants of a completed job in one step.
    pub fn apply(&mut self, variants: Vec<GeneratedVariant>, policy: RegenerationPolicy) {
        let incoming = variants.len();
        match policy {
            RegenerationPolicy::Replace => self.variants = variants,
            RegenerationPolicy::Append => self.variants.extend(variants),
        }
        self.prune();
        info!(
            incoming,
            total = self.variants.len(),
            policy = ?policy,
            "result set updated"
        );
    }

    pub fn clear(&mut self) {
        self.variants.clear();
        self.selected.clear();
        self.favorites.clear();
    }

    pub fn variants(&self) -> &[GeneratedVariant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, id: &VariantId) -> Option<&GeneratedVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Flip selection of `id`. Returns whether it is selected afterwards.
    pub fn toggle_select(&mut self, id: &VariantId) -> CreativeResult<bool> {
        self.ensure_present(id)?;
        Ok(flip(&mut self.selected, id))
    }

    /// Flip the local favorite mark of `id`.
    pub fn toggle_favorite(&mut self, id: &VariantId) -> CreativeResult<bool> {
        self.ensure_present(id)?;
        Ok(flip(&mut self.favorites, id))
    }

    pub fn is_selected(&self, id: &VariantId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_favorite(&self, id: &VariantId) -> bool {
        self.favorites.contains(id)
    }

    /// Selected ids in gallery order.
    pub fn selected_ids(&self) -> Vec<VariantId> {
        self.variants
            .iter()
            .filter(|v| self.selected.contains(&v.id))
            .map(|v| v.id.clone())
            .collect()
    }

    pub fn favorite_ids(&self) -> Vec<VariantId> {
        self.variants
            .iter()
            .filter(|v| self.favorites.contains(&v.id))
            .map(|v| v.id.clone())
            .collect()
    }

    fn ensure_present(&self, id: &VariantId) -> CreativeResult<()> {
        if self.get(id).is_some() {
            Ok(())
        } else {
            Err(CreativeError::UnknownVariant(id.to_string()))
        }
    }

    fn prune(&mut self) {
        let present: HashSet<&VariantId> = self.variants.iter().map(|v| &v.id).collect();
        let before = self.selected.len() + self.favorites.len();
        self.selected.retain(|id| present.contains(id));
        self.favorites.retain(|id| present.contains(id));
        let dropped = before - (self.selected.len() + self.favorites.len());
        if dropped > 0 {
            debug!(dropped, "stale selections pruned");
        }
    }
}

fn flip(set: &mut BTreeSet<VariantId>, id: &VariantId) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.clone());
        true
    }
}

/// Turn a service reply into gallery variants for job `job`.
///
/// Missing ids fall back to the 1-based position; duplicate ids within the
/// batch get the position appended. Missing prompt, score and type use the
/// request prompt, 85 and "AI Generated".
pub fn variants_from_remote(
    job: u64,
    remote: Vec<RemoteVariant>,
    request_prompt: &str,
) -> Vec<GeneratedVariant> {
    let received_at = Utc::now();
    let mut seen = HashSet::new();

    remote
        .into_iter()
        .enumerate()
        .map(|(idx, variant)| {
            let position = idx + 1;
            let mut key = variant
                .id
                .map(|id| id.to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| position.to_string());
            if !seen.insert(key.clone()) {
                key = format!("{key}-{position}");
                seen.insert(key.clone());
            }

            GeneratedVariant {
                id: VariantId::new(job, key),
                image: variant.image,
                prompt: variant
                    .prompt
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| request_prompt.to_string()),
                score: variant
                    .score
                    .filter(|s| s.is_finite())
                    .map(|s| s.round().clamp(0.0, u32::MAX as f64) as u32)
                    .unwrap_or(DEFAULT_SCORE),
                kind: variant
                    .kind
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_KIND.to_string()),
                received_at,
            }
        })
        .collect()
}

/// Lowercase `title`, collapse whitespace runs to `-` and drop characters
/// that are unsafe in file names.
pub fn slugify(title: &str) -> String {
    let slug = title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = slug.trim_matches('.').to_string();
    if slug.is_empty() {
        "generated-asset".to_string()
    } else {
        slug
    }
}

/// Decode a data-URI or bare base64 payload. Returns the bytes and the MIME
/// type when the payload declared one.
pub fn decode_image(encoding: &str) -> CreativeResult<(Vec<u8>, Option<String>)> {
    let trimmed = encoding.trim();
    let (mime, payload) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| CreativeError::Decode("data URI has no payload".to_string()))?;
            let Some(mime) = header.strip_suffix(";base64") else {
                return Err(CreativeError::Decode(
                    "only base64 data URIs are supported".to_string(),
                ));
            };
            (Some(mime.to_ascii_lowercase()), payload)
        }
        None if trimmed.starts_with("http://") || trimmed.starts_with("https://") => {
            return Err(CreativeError::Decode(
                "variant references a remote URL, not inline image data".to_string(),
            ));
        }
        None => (None, trimmed),
    };

    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| CreativeError::Decode(e.to_string()))?;
    Ok((bytes, mime.filter(|m| !m.is_empty())))
}

/// File extension for the decoded image, `png` when unknown.
fn extension_for(bytes: &[u8], mime: Option<&str>) -> &'static str {
    mime.and_then(ImageFormat::from_mime_type)
        .or_else(|| image::guess_format(bytes).ok())
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png")
}

/// File name a variant is saved under: `<slug>-<id>.<ext>`.
pub fn download_file_name(variant: &GeneratedVariant, extension: &str) -> String {
    let id = slugify(&variant.id.key);
    format!("{}-{}-{}.{extension}", slugify(variant.title()), variant.id.job, id)
}

/// Write `variant`'s image under `dir`. Reads the variant only.
pub async fn download_variant(variant: &GeneratedVariant, dir: &Path) -> CreativeResult<PathBuf> {
    let (bytes, mime) = decode_image(&variant.image)?;
    let extension = extension_for(&bytes, mime.as_deref());
    let path = dir.join(download_file_name(variant, extension));

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, &bytes).await?;
    info!(variant = %variant.id, path = %path.display(), bytes = bytes.len(), "variant downloaded");
    Ok(path)
}

/// Creative recommendations shown alongside the gallery.
pub fn recommendations() -> Vec<Recommendation> {
    vec![
        Recommendation {
            label: "Optimal Format",
            value: "9:16 Video",
            stat: "+42% engagement",
        },
        Recommendation {
            label: "Recommended Length",
            value: "12-15 sec",
            stat: "Best retention",
        },
        Recommendation {
            label: "Color Scheme",
            value: "High Contrast",
            stat: "+28% CTR",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RemoteId;

    fn remote(id: Option<RemoteId>, score: Option<f64>) -> RemoteVariant {
        RemoteVariant {
            id,
            image: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            prompt: None,
            score,
            kind: None,
        }
    }

    fn batch(job: u64, scores: &[f64]) -> Vec<GeneratedVariant> {
        let remote = scores
            .iter()
            .enumerate()
            .map(|(i, s)| remote(Some(RemoteId::Number(i as u64 + 1)), Some(*s)))
            .collect();
        variants_from_remote(job, remote, "Product in use, compelling call-to-action")
    }

    #[test]
    fn test_remote_defaults_and_order() {
        let variants = variants_from_remote(
            4,
            vec![
                remote(None, None),
                remote(Some(RemoteId::Text("x".into())), Some(90.6)),
            ],
            "Studio shot, soft light",
        );
        assert_eq!(variants[0].id, VariantId::new(4, "1"));
        assert_eq!(variants[0].score, 85);
        assert_eq!(variants[0].kind, "AI Generated");
        assert_eq!(variants[0].prompt, "Studio shot, soft light");
        assert_eq!(variants[1].id, VariantId::new(4, "x"));
        assert_eq!(variants[1].score, 91);
    }

    #[test]
    fn test_duplicate_remote_ids_are_disambiguated() {
        let variants = variants_from_remote(
            1,
            vec![
                remote(Some(RemoteId::Number(0)), None),
                remote(Some(RemoteId::Number(0)), None),
            ],
            "p",
        );
        assert_ne!(variants[0].id, variants[1].id);
        assert_eq!(variants[1].id.key, "0-2");
    }

    #[test]
    fn test_toggle_select_and_unknown_id() {
        let mut gallery = ResultGallery::new();
        gallery.apply(batch(1, &[91.0, 85.0, 77.0]), RegenerationPolicy::Replace);
        assert!(gallery.selected_ids().is_empty());

        let id = gallery.variants()[1].id.clone();
        assert!(gallery.toggle_select(&id).unwrap());
        assert!(gallery.is_selected(&id));
        assert!(!gallery.toggle_select(&id).unwrap());
        assert!(!gallery.is_selected(&id));

        let ghost = VariantId::new(9, "1");
        assert!(matches!(
            gallery.toggle_select(&ghost),
            Err(CreativeError::UnknownVariant(_))
        ));
        assert!(gallery.selected_ids().is_empty());
    }

    #[test]
    fn test_replace_prunes_selection_and_favorites() {
        let mut gallery = ResultGallery::new();
        gallery.apply(batch(1, &[91.0, 85.0]), RegenerationPolicy::Replace);
        let old = gallery.variants()[0].id.clone();
        gallery.toggle_select(&old).unwrap();
        gallery.toggle_favorite(&old).unwrap();

        gallery.apply(batch(2, &[70.0, 60.0]), RegenerationPolicy::Replace);
        assert_eq!(gallery.len(), 2);
        assert!(!gallery.is_selected(&old));
        assert!(!gallery.is_favorite(&old));
        assert!(gallery.selected_ids().is_empty());
        assert!(gallery.favorite_ids().is_empty());
    }

    #[test]
    fn test_append_keeps_earlier_variants_and_selection() {
        let mut gallery = ResultGallery::new();
        gallery.apply(batch(1, &[91.0]), RegenerationPolicy::Append);
        let first = gallery.variants()[0].id.clone();
        gallery.toggle_select(&first).unwrap();

        gallery.apply(batch(2, &[88.0]), RegenerationPolicy::Append);
        assert_eq!(gallery.len(), 2);
        assert_ne!(gallery.variants()[0].id, gallery.variants()[1].id);
        assert_eq!(gallery.selected_ids(), vec![first]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Product in use"), "product-in-use");
        assert_eq!(slugify("  Summer   Sale/2024  "), "summer-sale2024");
        assert_eq!(slugify("../.."), "generated-asset");
        assert_eq!(slugify(""), "generated-asset");
    }

    #[test]
    fn test_decode_image_variants() {
        let (bytes, mime) = decode_image("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(mime.as_deref(), Some("image/png"));
        assert_eq!(&bytes[..4], b"\x89PNG");

        let (bare, none) = decode_image("iVBORw0KGgo=").unwrap();
        assert_eq!(bare, bytes);
        assert!(none.is_none());

        assert!(decode_image("https://cdn.example.com/a.png").is_err());
        assert!(decode_image("data:image/png,raw").is_err());
        assert!(decode_image("not base64 !!").is_err());
    }

    #[tokio::test]
    async fn test_download_variant_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let variants = batch(3, &[91.0]);
        let path = download_variant(&variants[0], dir.path()).await.unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("product-in-use-3-1.png")
        );
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(&written[..4], b"\x89PNG");
    }

    #[test]
    fn test_recommendations_panel() {
        let recs = recommendations();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].value, "9:16 Video");
    }
}

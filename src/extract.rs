//! Selective hashtag extraction from a single tweet record.
//!
//! The record is walked with a serde visitor: only `entities.hashtags[].text`
//! is materialized, every other value (including the whole `quoted_status`
//! subtree) is consumed as [`IgnoredAny`] without building a document tree.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;

use crate::errors::ParseError;
use crate::graph::{normalize_tag, Observation};

/// Extract the distinct, normalized hashtags of the primary post in `record`.
///
/// Hashtags that appear only inside `quoted_status` are not attributed to the
/// post. A record without `entities` or `hashtags` yields an empty set.
/// Repeated `entities` or `hashtags` keys are unioned.
pub fn extract_hashtags(record: &[u8]) -> Result<Observation, ParseError> {
    let post: PostHashtags = serde_json::from_slice(record)?;
    Ok(post.0)
}

struct PostHashtags(Observation);

/// Field names that matter at either level of the record. `Hashtags` is only
/// looked at inside `entities`.
enum PostField {
    Entities,
    QuotedStatus,
    Hashtags,
    Other,
}

impl<'de> Deserialize<'de> for PostField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldVisitor;

        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = PostField;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field name")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PostField, E> {
                Ok(match v {
                    "entities" => PostField::Entities,
                    "quoted_status" => PostField::QuotedStatus,
                    "hashtags" => PostField::Hashtags,
                    _ => PostField::Other,
                })
            }
        }

        deserializer.deserialize_identifier(FieldVisitor)
    }
}

impl<'de> Deserialize<'de> for PostHashtags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(PostVisitor)
    }
}

struct PostVisitor;

impl<'de> Visitor<'de> for PostVisitor {
    type Value = PostHashtags;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tweet object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<PostHashtags, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut tags = Observation::new();
        while let Some(field) = map.next_key::<PostField>()? {
            match field {
                PostField::Entities => {
                    if let Some(Entities(found)) = map.next_value::<Option<Entities>>()? {
                        tags.extend(found);
                    }
                }
                // Quoted tweets carry their own entities; never attribute them here.
                PostField::QuotedStatus => {
                    map.next_value::<IgnoredAny>()?;
                }
                PostField::Hashtags | PostField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(PostHashtags(tags))
    }
}

/// Normalized tags of one `entities` object.
struct Entities(Observation);

impl<'de> Deserialize<'de> for Entities {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EntitiesVisitor)
    }
}

struct EntitiesVisitor;

impl<'de> Visitor<'de> for EntitiesVisitor {
    type Value = Entities;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an entities object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Entities, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut tags = Observation::new();
        while let Some(field) = map.next_key::<PostField>()? {
            match field {
                PostField::Hashtags => {
                    let entities = map.next_value::<Option<Vec<HashtagEntity>>>()?;
                    tags.extend(
                        entities
                            .into_iter()
                            .flatten()
                            .filter_map(|e| e.text)
                            .filter_map(|text| normalize_tag(&text)),
                    );
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Entities(tags))
    }
}

#[derive(Deserialize)]
struct HashtagEntity {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(record: &str) -> Vec<String> {
        extract_hashtags(record.as_bytes())
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn reads_entity_hashtags() {
        let record = r#"{"id": 1, "text": "hi #Data #Gretel",
            "entities": {"urls": [], "hashtags": [
                {"text": "Data", "indices": [3, 8]},
                {"indices": [9, 16], "text": "Gretel"}
            ]}}"#;
        assert_eq!(tags(record), vec!["data", "gretel"]);
    }

    #[test]
    fn ignores_quoted_status_hashtags() {
        let record = r#"{"quoted_status": {"entities": {"hashtags": [{"text": "quoted"}]},
            "quoted_status": {"entities": {"hashtags": [{"text": "deeper"}]}}},
            "entities": {"hashtags": [{"text": "own"}]}}"#;
        assert_eq!(tags(record), vec!["own"]);
    }

    #[test]
    fn ignores_nested_entities_under_other_fields() {
        let record = r#"{"retweeted_status": {"entities": {"hashtags": [{"text": "rt"}]}},
            "user": {"entities": {"hashtags": [{"text": "bio"}]}}}"#;
        assert!(tags(record).is_empty());
    }

    #[test]
    fn duplicates_collapse_after_lowercasing() {
        let record = r#"{"entities": {"hashtags": [
            {"text": "Rust"}, {"text": "RUST"}, {"text": "rust"}, {"text": ""}
        ]}}"#;
        assert_eq!(tags(record), vec!["rust"]);
    }

    #[test]
    fn missing_or_null_fields_yield_empty_set() {
        assert!(tags(r#"{}"#).is_empty());
        assert!(tags(r#"{"text": "no tags"}"#).is_empty());
        assert!(tags(r#"{"entities": null}"#).is_empty());
        assert!(tags(r#"{"entities": {"urls": []}}"#).is_empty());
        assert!(tags(r#"{"entities": {"hashtags": null}}"#).is_empty());
        assert!(tags(r#"{"entities": {"hashtags": [{"text": null}, {}]}}"#).is_empty());
    }

    #[test]
    fn repeated_entities_are_merged() {
        let record = r#"{"entities": {"hashtags": [{"text": "a"}]},
            "entities": {"hashtags": [{"text": "b"}]}}"#;
        assert_eq!(tags(record), vec!["a", "b"]);
    }

    #[test]
    fn repeated_hashtags_keys_are_merged() {
        let record = r#"{"entities": {"hashtags": [{"text": "a"}], "urls": [],
            "hashtags": [{"text": "B"}]}}"#;
        assert_eq!(tags(record), vec!["a", "b"]);
    }

    #[test]
    fn separator_is_stripped_from_tags() {
        let record = r#"{"entities": {"hashtags": [{"text": "A|B"}, {"text": "|"}]}}"#;
        assert_eq!(tags(record), vec!["ab"]);
    }

    #[test]
    fn escaped_text_is_decoded() {
        let record = r#"{"entities": {"hashtags": [{"text": "Caf\u00c9"}]}}"#;
        assert_eq!(tags(record), vec!["café"]);
    }

    #[test]
    fn malformed_records_are_errors() {
        for record in [
            "",
            "not json",
            r#"{"entities": {"hashtags": [{"text": "a"}"#,
            r#"["entities"]"#,
            r#"{"entities": {"hashtags": ["plain"]}}"#,
            r#"{"a": 1} trailing"#,
        ] {
            assert!(
                extract_hashtags(record.as_bytes()).is_err(),
                "expected parse error for {:?}",
                record
            );
        }
    }
}

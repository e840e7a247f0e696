// cm_entity.rs - parsing of the map entity string

use quetoo_common::q_shared::{com_parse, parse_vec3, Vec3};

use crate::cm_error::{CmError, Result};

/// One `{ "key" "value" ... }` block of the entity string. Pairs are kept
/// in file order; lookups return the last value for a repeated key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmEntity {
    pub pairs: Vec<(String, String)>,
}

impl CmEntity {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> Option<&str> {
        self.value("classname")
    }

    pub fn value_i32(&self, key: &str) -> Option<i32> {
        let v = self.value(key)?.trim();
        v.parse()
            .ok()
            .or_else(|| v.parse::<f32>().ok().map(|f| f as i32))
    }

    pub fn value_f32(&self, key: &str) -> Option<f32> {
        self.value(key)?.trim().parse().ok()
    }

    pub fn value_vec3(&self, key: &str) -> Option<Vec3> {
        parse_vec3(self.value(key)?)
    }
}

/// Parses the entity string into its blocks. The first entity is the
/// worldspawn in any well-formed map.
pub fn parse_entities(data: &str) -> Result<Vec<CmEntity>> {
    let mut entities = Vec::new();
    let mut rest = data;

    while let Some((token, remainder)) = com_parse(rest) {
        if token.quoted || token.text != "{" {
            return Err(CmError::Entities(format!(
                "found {} when expecting {{",
                token.text
            )));
        }
        rest = remainder;

        let mut entity = CmEntity::default();
        loop {
            let (key, remainder) = com_parse(rest)
                .ok_or_else(|| CmError::Entities("EOF without closing brace".into()))?;
            if !key.quoted && key.text == "}" {
                rest = remainder;
                break;
            }

            let (value, remainder) = com_parse(remainder)
                .ok_or_else(|| CmError::Entities("EOF without closing brace".into()))?;
            if !value.quoted && value.text == "}" {
                return Err(CmError::Entities("closing brace without data".into()));
            }

            entity.pairs.push((key.text, value.text));
            rest = remainder;
        }

        entities.push(entity);
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"
{
"classname" "worldspawn"
"message" "The Edge"
"sky" "unit1_"
}
// a comment between entities
{
"classname" "info_player_start"
"origin" "-64 128 24.5"
"angle" "90"
"spawnflags" "1792"
}
{
"classname" "light"
"light" "300"
"light" "150"
}
"#;

    #[test]
    fn test_parse_entities() {
        let entities = parse_entities(MAP).unwrap();
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].classname(), Some("worldspawn"));
        assert_eq!(entities[0].value("message"), Some("The Edge"));
        assert_eq!(entities[1].value_vec3("origin"), Some([-64.0, 128.0, 24.5]));
        assert_eq!(entities[1].value_i32("spawnflags"), Some(1792));
        assert_eq!(entities[1].value_f32("angle"), Some(90.0));
        assert_eq!(entities[1].value("target"), None);
    }

    #[test]
    fn test_repeated_key_takes_last() {
        let entities = parse_entities(MAP).unwrap();
        assert_eq!(entities[2].value_i32("light"), Some(150));
        assert_eq!(entities[2].pairs.len(), 3);
    }

    #[test]
    fn test_quoted_braces_are_values() {
        let entities = parse_entities(r#"{ "message" "}" "classname" "{" }"#).unwrap();
        assert_eq!(entities[0].value("message"), Some("}"));
        assert_eq!(entities[0].classname(), Some("{"));
    }

    #[test]
    fn test_empty_string() {
        assert!(parse_entities("").unwrap().is_empty());
        assert!(parse_entities("   \n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_entities("classname worldspawn"), Err(CmError::Entities(_))));
        assert!(matches!(parse_entities(r#"{ "classname" "light""#), Err(CmError::Entities(_))));
        assert!(matches!(parse_entities(r#"{ "classname" }"#), Err(CmError::Entities(_))));
    }
}

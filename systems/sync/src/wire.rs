//! Line-delimited JSON codec shared by every session channel.

use tabletop_core::{ChannelError, Entity, Envelope, EntityId, Inbound, Intent};
use thiserror::Error;

/// Errors raised while decoding or validating inbound lines.
#[derive(Debug, Error)]
pub enum WireError {
    /// The line is not a well-formed envelope.
    #[error("malformed inbound line: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The envelope decoded but carries values the board cannot accept.
    #[error("invalid {event} payload: {reason}")]
    Invalid {
        /// Name of the offending event.
        event: &'static str,
        /// Description of the rejected value.
        reason: String,
    },
}

/// Decodes a single line into an envelope. Validation is performed separately.
pub fn decode_line(line: &str) -> Result<Envelope, WireError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Encodes an outbound intent as a single line without the trailing newline.
pub fn encode_intent(intent: &Intent) -> Result<String, ChannelError> {
    serde_json::to_string(intent).map_err(|error| ChannelError::Encode(error.to_string()))
}

/// Checks the invariants the board relies on before an event reaches it.
pub fn validate(event: &Inbound) -> Result<(), WireError> {
    let name = event.name();
    let invalid = |reason: String| WireError::Invalid {
        event: name,
        reason,
    };

    match event {
        Inbound::SessionResourcesReady { self_entity, .. } => match self_entity {
            Some(id) => validate_id(id).map_err(invalid),
            None => Ok(()),
        },
        // Unusable records inside a full list are skipped by the board rebuild.
        Inbound::EntityListResult { .. } | Inbound::EntitiesSynced { .. } => Ok(()),
        Inbound::EntitySpawned { entity } => validate_entity(entity).map_err(invalid),
        Inbound::EntityMoved { entity, .. } | Inbound::EntityRemoved { entity } => {
            validate_id(entity).map_err(invalid)
        }
        Inbound::EntityStatsUpdated {
            entity, hit_points, ..
        } => {
            validate_id(entity).map_err(invalid)?;
            if hit_points.max <= 0 {
                return Err(invalid(format!(
                    "entity {entity} reports non-positive maximum hit points"
                )));
            }
            Ok(())
        }
        Inbound::ChatMessage { .. } | Inbound::ErrorNotice { .. } => Ok(()),
    }
}

fn validate_id(id: &EntityId) -> Result<(), String> {
    if id.is_empty() {
        return Err("entity identifier is empty".to_owned());
    }
    Ok(())
}

fn validate_entity(entity: &Entity) -> Result<(), String> {
    entity.defect().map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::GridCell;

    #[test]
    fn decodes_sequenced_move() {
        let envelope =
            decode_line(r#"{"seq":3,"type":"entity_moved","entity":"orc","to":{"x":2,"y":5}}"#)
                .expect("valid line");

        assert_eq!(
            envelope,
            Envelope::sequenced(
                3,
                Inbound::EntityMoved {
                    entity: EntityId::new("orc"),
                    to: GridCell::new(2, 5),
                }
            )
        );
    }

    #[test]
    fn decodes_unsequenced_chat_with_surrounding_whitespace() {
        let envelope = decode_line("  {\"type\":\"chat_message\",\"sender\":\"dm\",\"text\":\"hi\"}\n")
            .expect("valid line");

        assert_eq!(envelope.sequence, None);
        assert_eq!(envelope.event.name(), "chat_message");
    }

    #[test]
    fn rejects_unknown_event_tags() {
        let error = decode_line(r#"{"type":"entity_teleported","entity":"orc"}"#)
            .expect_err("closed set of events");
        assert!(matches!(error, WireError::Malformed(_)));
    }

    #[test]
    fn entity_fields_default_when_omitted() {
        let envelope = decode_line(
            r#"{"type":"entity_spawned","entity":{"id":"orc","kind":"enemy","display_name":"Orc","hit_points":{"current":15,"max":15},"armor_class":13,"position":{"x":1,"y":1}}}"#,
        )
        .expect("optional fields default");

        let Inbound::EntitySpawned { entity } = envelope.event else {
            panic!("expected spawn");
        };
        assert!(entity.footprint.is_valid());
        assert!(entity.asset_ref.is_empty());
        assert!(validate(&Inbound::EntitySpawned { entity }).is_ok());
    }

    #[test]
    fn rejects_blank_ids_and_zero_footprints() {
        let blank = decode_line(r#"{"type":"entity_removed","entity":" "}"#).expect("decodes");
        assert!(matches!(
            validate(&blank.event),
            Err(WireError::Invalid {
                event: "entity_removed",
                ..
            })
        ));

        let flat = decode_line(
            r#"{"type":"entity_spawned","entity":{"id":"orc","kind":"enemy","display_name":"Orc","hit_points":{"current":15,"max":15},"armor_class":13,"footprint":{"width":0,"height":1},"position":{"x":1,"y":1}}}"#,
        )
        .expect("decodes");
        assert!(validate(&flat.event).is_err());
    }

    #[test]
    fn full_lists_pass_with_unusable_records() {
        let list = decode_line(
            r#"{"type":"entities_synced","entities":[{"id":"orc","kind":"enemy","display_name":"Orc","hit_points":{"current":15,"max":15},"armor_class":13,"footprint":{"width":0,"height":1},"position":{"x":1,"y":1}}]}"#,
        )
        .expect("decodes");
        assert!(validate(&list.event).is_ok());
    }

    #[test]
    fn rejects_non_positive_maximum_hit_points() {
        let event = Inbound::EntityStatsUpdated {
            entity: EntityId::new("orc"),
            hit_points: tabletop_core::HitPoints::new(0, 0),
            armor_class: 10,
        };
        assert!(validate(&event).is_err());
    }

    #[test]
    fn encodes_intents_with_type_tag() {
        let line = encode_intent(&Intent::RequestMove {
            entity: EntityId::new("orc"),
            target: GridCell::new(4, 1),
        })
        .expect("encodes");

        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(
            value,
            serde_json::json!({
                "type": "request_move",
                "entity": "orc",
                "target": { "x": 4, "y": 1 }
            })
        );
    }
}

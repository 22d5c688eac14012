//! Offline `replay` subcommand: feeds an inbound event log through the sync client.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tabletop_board::{query, Board};
use tabletop_core::{GridCell, Intent};
use tabletop_system_sync::{wire, LoopbackChannel, SyncClient, SyncStats};
use tracing::warn;

/// Outcome of replaying a single event log.
#[derive(Debug, PartialEq)]
pub(crate) struct ReplayReport {
    occupancy: Vec<(GridCell, String)>,
    intents: Vec<Intent>,
    notices: Vec<String>,
    stats: SyncStats,
    malformed: usize,
}

/// Replays JSON-lines envelopes for the campaign `code` into a fresh board.
pub(crate) fn replay<R: BufRead>(reader: R, code: &str) -> Result<ReplayReport> {
    let mut channel = LoopbackChannel::new();
    let mut malformed = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match wire::decode_line(&line) {
            Ok(envelope) => channel.push(envelope),
            Err(error) => {
                warn!(line = index + 1, %error, "skipping malformed event");
                malformed += 1;
            }
        }
    }

    let mut client = SyncClient::new(channel, code);
    let mut board = Board::new();
    let mut changes = Vec::new();
    let _ = client
        .pump(&mut board, &mut changes)
        .context("replay aborted")?;

    let occupancy = query::occupancy_view(&board)
        .map(|view| {
            view.iter()
                .map(|(cell, entity)| (cell, entity.as_str().to_owned()))
                .collect()
        })
        .unwrap_or_default();

    Ok(ReplayReport {
        occupancy,
        intents: client.channel_mut().take_sent(),
        notices: query::notices(&board)
            .map(|notice| notice.detail.clone())
            .collect(),
        stats: client.stats(),
        malformed,
    })
}

impl ReplayReport {
    /// Writes a human readable summary.
    pub(crate) fn print(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "occupancy:")?;
        for (cell, entity) in &self.occupancy {
            writeln!(out, "  {cell} {entity}")?;
        }
        writeln!(out, "intents:")?;
        for intent in &self.intents {
            let line = wire::encode_intent(intent)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
            writeln!(out, "  {line}")?;
        }
        writeln!(out, "notices:")?;
        for notice in &self.notices {
            writeln!(out, "  {notice}")?;
        }
        let SyncStats {
            applied,
            stale,
            deferred,
            rejected,
            conflicts,
            resyncs_requested,
        } = self.stats;
        writeln!(
            out,
            "applied {applied}, stale {stale}, deferred {deferred}, rejected {rejected}, \
             malformed {}, conflicts {conflicts}, resyncs {resyncs_requested}",
            self.malformed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"
{"seq":1,"type":"session_resources_ready","map":{"width_px":128,"height_px":96,"tile_size_px":32,"map_image_url":"maps/keep.png"},"role":"game_master"}
{"seq":2,"type":"entity_list_result","entities":[{"id":"orc","kind":"enemy","display_name":"Orc","hit_points":{"current":15,"max":15},"armor_class":13,"position":{"x":1,"y":1}}]}
not json at all
{"seq":3,"type":"entity_moved","entity":"orc","to":{"x":2,"y":1}}
{"seq":3,"type":"entity_moved","entity":"orc","to":{"x":0,"y":0}}
{"seq":4,"type":"error_notice","detail":"table is full"}
"#;

    #[test]
    fn replay_reports_final_occupancy_and_outbound_intents() {
        let report = replay(LOG.as_bytes(), "keep").expect("replay");

        assert_eq!(report.occupancy, vec![(GridCell::new(2, 1), "orc".to_owned())]);
        assert_eq!(
            report.intents,
            vec![Intent::RequestEntityList {
                code: "keep".to_owned()
            }]
        );
        assert_eq!(report.notices, vec!["table is full".to_owned()]);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.stats.applied, 4);
        assert_eq!(report.stats.stale, 1);
    }

    #[test]
    fn sequence_gap_triggers_a_resync_request() {
        let log = r#"
{"seq":1,"type":"session_resources_ready","map":{"width_px":128,"height_px":96,"tile_size_px":32,"map_image_url":"maps/keep.png"},"role":"player"}
{"seq":2,"type":"entity_list_result","entities":[]}
{"seq":5,"type":"entity_removed","entity":"orc"}
"#;
        let report = replay(log.as_bytes(), "keep").expect("replay");

        assert_eq!(report.stats.conflicts, 1);
        assert_eq!(report.stats.resyncs_requested, 1);
        assert_eq!(
            report.intents.last(),
            Some(&Intent::RequestEntityList {
                code: "keep".to_owned()
            })
        );
        assert!(report.occupancy.is_empty());
    }

    #[test]
    fn invalid_map_aborts_the_replay() {
        let log = r#"{"seq":1,"type":"session_resources_ready","map":{"width_px":10,"height_px":10,"tile_size_px":32,"map_image_url":""},"role":"player"}"#;
        assert!(replay(log.as_bytes(), "keep").is_err());
    }

    #[test]
    fn summary_lists_every_section() {
        let report = replay(LOG.as_bytes(), "keep").expect("replay");
        let mut out = Vec::new();
        report.print(&mut out).expect("write to memory");
        let text = String::from_utf8(out).expect("utf-8");

        assert!(text.contains("occupancy:\n  (2, 1) orc\n"));
        assert!(text.contains("\"type\":\"request_entity_list\""));
        assert!(text.contains("  table is full\n"));
        assert!(text.contains("malformed 1"));
    }
}

//! Neighbor discovery.
//!
//! Scrapes the device's LLDP neighbor table for interfaces that face a
//! wireless-capable neighbor. The table is fixed-width text; the column
//! layout lives in a [`TableSchema`] so a different output format is a new
//! schema value, not an edit to the parser.

use std::fmt;
use std::ops::Range;

use log::debug;

use crate::error::Result;
use crate::session::Session;

/// Read query for the device's neighbor table.
pub const NEIGHBOR_TABLE_COMMAND: &str = "show lldp neighbors";

/// A local interface facing a wireless-capable neighbor, eligible for
/// reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborCandidate {
    /// Neighbor device name as reported in the table.
    pub neighbor_name: String,

    /// Local interface the neighbor was seen on.
    pub local_interface: String,
}

impl fmt::Display for NeighborCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.neighbor_name, self.local_interface)
    }
}

/// Column layout of a fixed-width neighbor table.
///
/// Offsets are a contract with one device family's table formatting; if the
/// format drifts, the pinned parser tests fail rather than the parser
/// silently mis-reading rows.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Rows at or under this width are not data rows and are dropped.
    pub min_row_width: usize,

    /// Byte offset of the capability code that is checked for the marker.
    pub capability_offset: usize,

    /// Capability code identifying a wireless neighbor.
    pub wireless_marker: u8,

    /// Byte range of the neighbor-name field.
    pub neighbor_name_span: Range<usize>,

    /// Byte range of the local-interface field.
    pub local_interface_span: Range<usize>,
}

impl TableSchema {
    /// Layout of `show lldp neighbors` on Cisco IOS. `W` is the LLDP
    /// capability code for a WLAN access point.
    pub const CISCO_IOS: TableSchema = TableSchema {
        min_row_width: 47,
        capability_offset: 46,
        wireless_marker: b'W',
        neighbor_name_span: 0..20,
        local_interface_span: 20..35,
    };
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::CISCO_IOS
    }
}

/// Parse neighbor-table text into candidates, preserving row order.
///
/// Rows shorter than the threshold or without the wireless marker are
/// dropped silently. No deduplication.
pub fn parse_neighbors(text: &str, schema: &TableSchema) -> Vec<NeighborCandidate> {
    text.lines()
        .filter_map(|line| parse_row(line, schema))
        .collect()
}

/// Parse one physical row, or drop it.
fn parse_row(line: &str, schema: &TableSchema) -> Option<NeighborCandidate> {
    if line.len() <= schema.min_row_width {
        return None;
    }
    if *line.as_bytes().get(schema.capability_offset)? != schema.wireless_marker {
        return None;
    }

    let neighbor_name = line.get(schema.neighbor_name_span.clone())?.trim();
    let local_interface = line.get(schema.local_interface_span.clone())?.trim();

    Some(NeighborCandidate {
        neighbor_name: neighbor_name.to_string(),
        local_interface: local_interface.to_string(),
    })
}

/// Query the neighbor table and parse it into candidates.
pub async fn discover<S: Session>(
    session: &mut S,
    schema: &TableSchema,
) -> Result<Vec<NeighborCandidate>> {
    let text = session.execute(NEIGHBOR_TABLE_COMMAND).await?;
    let candidates = parse_neighbors(&text, schema);
    debug!("discovered {} wireless neighbor(s)", candidates.len());
    Ok(candidates)
}

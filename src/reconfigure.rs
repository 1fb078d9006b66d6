//! Interface reconfiguration engine.
//!
//! For each retained candidate: read the interface's current access VLAN
//! out of its running config, shut the interface down, then reset it to
//! defaults and rebuild it (description, access VLAN, access mode, enable).
//! Changes are applied directly to the live device; there is no dry-run
//! and no rollback.

use log::debug;

use crate::discovery::NeighborCandidate;
use crate::error::{ParseError, Result};
use crate::session::Session;

/// Read query for an interface's current configuration.
pub const RUNNING_CONFIG_COMMAND: &str = "show running-config interface";

/// Left-trimmed literal prefix of the access-VLAN line in a running config.
const ACCESS_VLAN_PREFIX: &str = "switchport access vlan";

/// Everything needed to rebuild one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconfigurationPlan {
    /// Interface being rebuilt.
    pub local_interface: String,

    /// Neighbor name, written as the interface description.
    pub neighbor_name: String,

    /// Access VLAN id carried over from the current configuration.
    pub vlan_id: String,
}

/// Extract the access VLAN id from a running-config excerpt.
///
/// Scans for the first line whose left-trimmed text starts with the literal
/// `switchport access vlan` and returns the trimmed remainder. There is no
/// default VLAN to fall back to, so an interface without such a line is a
/// [`ParseError::MissingVlan`]; the caller skips that candidate.
pub fn extract_access_vlan(
    running_config: &str,
    interface: &str,
) -> std::result::Result<String, ParseError> {
    for line in running_config.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(ACCESS_VLAN_PREFIX) {
            let vlan_id = rest.trim();
            if !vlan_id.is_empty() {
                return Ok(vlan_id.to_string());
            }
        }
    }
    Err(ParseError::MissingVlan {
        interface: interface.to_string(),
    })
}

/// First config batch: take the interface down.
pub fn shutdown_batch(interface: &str) -> Vec<String> {
    vec![
        format!("interface {interface}"),
        "shutdown".to_string(),
        "exit".to_string(),
    ]
}

/// Second config batch: reset the interface to defaults and rebuild it.
pub fn rebuild_batch(plan: &ReconfigurationPlan) -> Vec<String> {
    vec![
        format!("default interface {}", plan.local_interface),
        format!("interface {}", plan.local_interface),
        format!("description {}", plan.neighbor_name),
        format!("switchport access vlan {}", plan.vlan_id),
        "switchport mode access".to_string(),
        "no shutdown".to_string(),
        "exit".to_string(),
    ]
}

/// Rebuild one candidate's interface on the live device.
///
/// Queries the current VLAN assignment first; the plan cannot be executed
/// without it.
pub async fn reconfigure<S: Session>(
    session: &mut S,
    candidate: &NeighborCandidate,
) -> Result<ReconfigurationPlan> {
    let query = format!("{RUNNING_CONFIG_COMMAND} {}", candidate.local_interface);
    let running_config = session.execute(&query).await?;

    let vlan_id = extract_access_vlan(&running_config, &candidate.local_interface)?;
    let plan = ReconfigurationPlan {
        local_interface: candidate.local_interface.clone(),
        neighbor_name: candidate.neighbor_name.clone(),
        vlan_id,
    };

    debug!(
        "rebuilding {} (vlan {}, description '{}')",
        plan.local_interface, plan.vlan_id, plan.neighbor_name
    );

    session.execute_config(&shutdown_batch(&plan.local_interface)).await?;
    session.execute_config(&rebuild_batch(&plan)).await?;

    Ok(plan)
}

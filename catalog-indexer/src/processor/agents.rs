//! Agent deduplication within one entity's agent list.
//!
//! The same person may be credited in several roles on one record. Agents are
//! keyed by exact name; a repeated name adds its role to the existing entry
//! instead of producing a second agent. Dedup never crosses entity levels.

use catalog_indexer_shared::{AgentDocument, AgentRole};

use crate::errors::IngestError;
use crate::processor::converter::convert_agent;

/// Convert an entity's agent-role pairings into deduplicated agent documents.
///
/// Output keeps first-encounter order. Only the first appearance of a name is
/// fully converted; later appearances contribute their role and aliases.
pub fn dedupe_agents(agents: &[AgentRole]) -> Result<Vec<AgentDocument>, IngestError> {
    let mut deduped: Vec<AgentDocument> = Vec::new();

    for pairing in agents {
        let position = deduped.iter().position(|a| a.name == pairing.agent.name);

        let entry = match position {
            Some(index) => {
                let entry = &mut deduped[index];
                for alias in &pairing.agent.aliases {
                    if !entry.aliases.contains(alias) {
                        entry.aliases.push(alias.clone());
                    }
                }
                entry
            }
            None => {
                deduped.push(convert_agent(&pairing.agent)?);
                let last = deduped.len() - 1;
                &mut deduped[last]
            }
        };

        if let Some(role) = &pairing.role {
            if !entry.roles.contains(role) {
                entry.roles.push(role.clone());
            }
        }
    }

    Ok(deduped)
}

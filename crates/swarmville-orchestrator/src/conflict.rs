use std::collections::HashMap;
use swarmville_core::{Conflict, ConflictKind, Subtask};

/// Report resource conflicts among `active` subtasks.
///
/// One pass over a claim table: the first worker to declare a resource owns
/// it, and every later claim by a different worker yields a conflict naming
/// both. Conflicts are informational; nothing is blocked.
pub fn detect(active: &[Subtask]) -> Vec<Conflict> {
    let mut claims: HashMap<&str, &str> = HashMap::new();
    let mut conflicts = Vec::new();

    for subtask in active {
        for resource in &subtask.resources {
            match claims.get(resource.as_str()) {
                Some(owner) if *owner != subtask.agent_id => conflicts.push(Conflict {
                    kind: ConflictKind::ResourceConflict,
                    resource: resource.clone(),
                    agents: vec![(*owner).to_string(), subtask.agent_id.clone()],
                    message: format!("Multiple agents trying to access: {resource}"),
                }),
                Some(_) => {}
                None => {
                    claims.insert(resource.as_str(), subtask.agent_id.as_str());
                }
            }
        }
    }

    conflicts
}

//! Execution planner - reads observed state and plans each group

use rgkit::reconcile::reconcile;
use rgkit::{Client, Plan, ResourceGroupSpec, Snapshot, Strategy};

/// Observed state, desired state and planned changes for one group
#[derive(Debug)]
pub struct GroupPlan {
    pub desired: ResourceGroupSpec,
    pub observed: Option<Snapshot>,
    pub plan: Plan,
}

/// Plans for every selected group, plus groups that could not be planned
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub groups: Vec<GroupPlan>,
    pub failures: Vec<(String, rgkit::Error)>,
}

impl ExecutionPlan {
    /// Groups with at least one change
    pub fn pending(&self) -> impl Iterator<Item = &GroupPlan> {
        self.groups.iter().filter(|g| !g.plan.is_empty())
    }

    pub fn change_count(&self) -> usize {
        self.groups.iter().map(|g| g.plan.len()).sum()
    }

    pub fn is_converged(&self) -> bool {
        self.change_count() == 0
    }
}

/// Read each group and plan its convergence.
///
/// A group whose read or planning fails is recorded and skipped; the rest
/// are still planned.
pub fn build(client: &mut Client, groups: &[&ResourceGroupSpec], strategy: Strategy) -> ExecutionPlan {
    let mut execution = ExecutionPlan::default();

    for desired in groups {
        let observed = match client.read(&desired.name) {
            Ok(observed) => observed,
            Err(e) => {
                log::warn!("{}", super::differ::error_chain(&e));
                execution.failures.push((desired.name.clone(), e));
                continue;
            }
        };

        match reconcile(observed.as_ref(), desired, strategy) {
            Ok(plan) => execution.groups.push(GroupPlan {
                desired: (*desired).clone(),
                observed,
                plan,
            }),
            Err(e) => execution.failures.push((desired.name.clone(), e)),
        }
    }

    execution
}

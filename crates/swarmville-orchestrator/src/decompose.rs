//! Rule-table decomposition of a task description into subtask specs.
//!
//! Templates are evaluated top-down and the first whose predicate matches the
//! lowercased description wins. Each step names the role it wants; steps that
//! cannot be assigned (no matching worker and no fallback) are dropped, so an
//! empty roster always yields an empty plan.

use serde::{Deserialize, Serialize};
use swarmville_core::WorkerDescriptor;

const CODE_ROLES: &[&str] = &["coder", "developer", "engineer"];
const REVIEW_ROLES: &[&str] = &["reviewer", "qa", "quality"];
const DEPLOY_ROLES: &[&str] = &["deployer", "devops", "release"];
const TEST_ROLES: &[&str] = &["tester", "qa", "quality"];

/// Tools for steps that read or change the repository.
const SOURCE_TOOLS: &[&str] = &["github"];

/// Resource claimed by steps that touch the deployment target.
pub const DEPLOYMENT_RESOURCE: &str = "deployment";

/// One planned subtask, before it is materialized on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub agent_id: String,
    pub description: String,
    /// Relative complexity, used for progress accounting.
    pub weight: u32,
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tools: Vec<String>,
}

/// Who a template step should go to.
#[derive(Debug, Clone, Copy)]
enum Assignee {
    /// First worker matching the keywords, else the first roster entry.
    RoleOrFirst(&'static [&'static str]),
    /// First worker matching the keywords, else the step is dropped.
    RoleOnly(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct Step {
    description: Option<&'static str>,
    assignee: Assignee,
    weight: u32,
    requires_approval: bool,
    resources: &'static [&'static str],
    tools: &'static [&'static str],
}

impl Step {
    const fn new(description: &'static str, assignee: Assignee, weight: u32) -> Self {
        Self {
            description: Some(description),
            assignee,
            weight,
            requires_approval: false,
            resources: &[],
            tools: &[],
        }
    }

    /// A step that carries the task description itself.
    const fn verbatim(assignee: Assignee, weight: u32) -> Self {
        Self {
            description: None,
            assignee,
            weight,
            requires_approval: false,
            resources: &[],
            tools: &[],
        }
    }

    const fn gated(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    const fn claims(mut self, resources: &'static [&'static str]) -> Self {
        self.resources = resources;
        self
    }

    /// Tools a replacement worker must hold to take the step over.
    const fn needs(mut self, tools: &'static [&'static str]) -> Self {
        self.tools = tools;
        self
    }
}

/// The known task shapes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTemplate {
    PrReview,
    BugFix,
    Deployment,
    Generic,
}

impl TaskTemplate {
    /// Templates in the order they are tried.
    pub const PRECEDENCE: [TaskTemplate; 4] = [
        TaskTemplate::PrReview,
        TaskTemplate::BugFix,
        TaskTemplate::Deployment,
        TaskTemplate::Generic,
    ];

    /// First template whose predicate matches `description`.
    pub fn classify(description: &str) -> TaskTemplate {
        let lower = description.to_lowercase();
        Self::PRECEDENCE
            .into_iter()
            .find(|template| template.matches(&lower))
            .unwrap_or(TaskTemplate::Generic)
    }

    fn matches(self, lower: &str) -> bool {
        match self {
            TaskTemplate::PrReview => lower.contains("review") && lower.contains("pr"),
            TaskTemplate::BugFix => lower.contains("fix") && lower.contains("bug"),
            TaskTemplate::Deployment => lower.contains("deploy"),
            TaskTemplate::Generic => true,
        }
    }

    fn steps(self) -> &'static [Step] {
        const PR_REVIEW: &[Step] = &[
            Step::new(
                "Fetch and analyze PR code changes",
                Assignee::RoleOrFirst(CODE_ROLES),
                2,
            )
            .needs(SOURCE_TOOLS),
            Step::new(
                "Review code for quality and security issues",
                Assignee::RoleOnly(REVIEW_ROLES),
                3,
            )
            .needs(SOURCE_TOOLS),
            Step::new(
                "Merge PR and trigger deployment",
                Assignee::RoleOnly(DEPLOY_ROLES),
                2,
            )
            .needs(SOURCE_TOOLS)
            .gated()
            .claims(&[DEPLOYMENT_RESOURCE]),
        ];
        const BUG_FIX: &[Step] = &[
            Step::new(
                "Investigate and identify the bug",
                Assignee::RoleOrFirst(CODE_ROLES),
                3,
            )
            .needs(SOURCE_TOOLS),
            Step::new(
                "Implement fix for the identified issue",
                Assignee::RoleOrFirst(CODE_ROLES),
                3,
            )
            .needs(SOURCE_TOOLS),
            Step::new(
                "Test the fix and verify resolution",
                Assignee::RoleOnly(TEST_ROLES),
                2,
            ),
        ];
        const DEPLOYMENT: &[Step] = &[
            Step::new("Run pre-deployment tests", Assignee::RoleOnly(TEST_ROLES), 2),
            Step::new(
                "Execute deployment to target environment",
                Assignee::RoleOrFirst(DEPLOY_ROLES),
                3,
            )
            .needs(SOURCE_TOOLS)
            .gated()
            .claims(&[DEPLOYMENT_RESOURCE]),
            Step::new(
                "Verify deployment success",
                Assignee::RoleOrFirst(DEPLOY_ROLES),
                1,
            ),
        ];
        const GENERIC: &[Step] = &[Step::verbatim(Assignee::RoleOrFirst(&[]), 3)];

        match self {
            TaskTemplate::PrReview => PR_REVIEW,
            TaskTemplate::BugFix => BUG_FIX,
            TaskTemplate::Deployment => DEPLOYMENT,
            TaskTemplate::Generic => GENERIC,
        }
    }
}

/// First roster entry whose role or name contains any of `keywords`.
///
/// The roster order decides ties, not the keyword order.
pub fn find_by_role<'a>(
    roster: &'a [WorkerDescriptor],
    keywords: &[&str],
) -> Option<&'a WorkerDescriptor> {
    if keywords.is_empty() {
        return None;
    }
    roster.iter().find(|worker| worker.matches_any(keywords))
}

fn assign<'a>(roster: &'a [WorkerDescriptor], assignee: Assignee) -> Option<&'a WorkerDescriptor> {
    match assignee {
        Assignee::RoleOrFirst(keywords) => find_by_role(roster, keywords).or(roster.first()),
        Assignee::RoleOnly(keywords) => find_by_role(roster, keywords),
    }
}

/// Split `description` into an ordered plan for `roster`.
pub fn decompose(description: &str, roster: &[WorkerDescriptor]) -> Vec<SubtaskSpec> {
    let template = TaskTemplate::classify(description);
    template
        .steps()
        .iter()
        .filter_map(|step| {
            let worker = assign(roster, step.assignee)?;
            Some(SubtaskSpec {
                agent_id: worker.id.clone(),
                description: step
                    .description
                    .map_or_else(|| description.to_string(), str::to_string),
                weight: step.weight,
                requires_approval: step.requires_approval,
                resources: step.resources.iter().map(|r| (*r).to_string()).collect(),
                required_tools: step.tools.iter().map(|t| (*t).to_string()).collect(),
            })
        })
        .collect()
}

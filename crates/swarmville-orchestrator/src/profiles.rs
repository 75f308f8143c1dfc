use swarmville_core::WorkerDescriptor;

/// The three-worker demo roster used when no roster is configured.
pub fn default_roster() -> Vec<WorkerDescriptor> {
    vec![coder(), reviewer(), deployer()]
}

fn coder() -> WorkerDescriptor {
    WorkerDescriptor::new("agent_coder", "Code Analyzer", "Senior Software Engineer")
        .with_goal("Analyze and write high-quality code")
        .with_tools(["github", "code_linter"])
        .with_model("gpt-4")
}

fn reviewer() -> WorkerDescriptor {
    WorkerDescriptor::new("agent_reviewer", "Code Reviewer", "Quality Assurance Engineer")
        .with_goal("Review code for quality and security")
        .with_tools(["github", "security_scanner", "code_linter"])
        .with_model("gpt-4")
}

fn deployer() -> WorkerDescriptor {
    WorkerDescriptor::new("agent_deployer", "Release Manager", "DevOps Engineer")
        .with_goal("Deploy code safely to production")
        .with_tools(["github", "slack"])
        .with_model("gpt-3.5-turbo")
}

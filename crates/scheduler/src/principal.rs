/// Resolves the principal a submission is attributed to.
///
/// Called once per submission on the submitting thread. Embedding
/// applications plug in their own notion of "current user" here.
pub trait PrincipalResolver: Send + Sync {
    fn current_principal(&self) -> Option<String>;
}

/// Default resolver: no principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl PrincipalResolver for Anonymous {
    fn current_principal(&self) -> Option<String> {
        None
    }
}

impl<F> PrincipalResolver for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_principal(&self) -> Option<String> {
        self()
    }
}

use kube::config::Kubeconfig;

use crate::error::CollectionError;

/// Kubeconfig text pasted by the user, kept verbatim for `kubectl`.
#[derive(Clone)]
pub struct Credentials {
    raw: String,
    current_context: Option<String>,
}

impl Credentials {
    pub fn parse(raw: &str) -> Result<Self, CollectionError> {
        if raw.trim().is_empty() {
            return Err(CollectionError::EmptyCredentials);
        }

        let kubeconfig = Kubeconfig::from_yaml(raw)?;

        Ok(Credentials {
            raw: raw.to_owned(),
            current_context: kubeconfig.current_context.filter(|ctx| !ctx.is_empty()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }
}

// Never print the credentials themselves.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("current_context", &self.current_context)
            .field("len", &self.raw.len())
            .finish()
    }
}

// src/engine/principals.rs

use validator::Validate;

use crate::{
    engine::{EngineError, StoreHandle},
    models::user::{IdentityAssertion, Principal, Role},
};

/// Registers principals vouched for by the identity provider.
#[derive(Clone)]
pub struct PrincipalDirectory {
    db: StoreHandle,
}

impl PrincipalDirectory {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    /// Upserts the principal behind a verified assertion. The role comes
    /// from the email domain.
    pub async fn sign_in(
        &self,
        assertion: &IdentityAssertion,
        student_domain: &str,
    ) -> Result<Principal, EngineError> {
        assertion.validate()?;

        let role = Role::classify(&assertion.email, student_domain);
        let name = match assertion.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => assertion
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let principal = self
            .db
            .bounded(self.db.store().upsert_principal(&assertion.email, &name, role))
            .await?;
        tracing::info!("Principal {} signed in as {}", principal.id, principal.role);
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::Harness;

    fn assertion(email: &str, name: Option<&str>) -> IdentityAssertion {
        IdentityAssertion {
            sub: "idp-123".to_string(),
            email: email.to_string(),
            name: name.map(str::to_string),
            exp: 0,
        }
    }

    #[tokio::test]
    async fn test_sign_in_classifies_and_upserts() {
        let h = Harness::new().await;
        let directory = &h.engine.principals;

        let student = directory
            .sign_in(&assertion("ada@students.example.edu", None), "students.example.edu")
            .await
            .unwrap();
        assert_eq!(student.role, Role::Student);
        assert_eq!(student.name, "ada");

        let again = directory
            .sign_in(
                &assertion("ada@students.example.edu", Some("Ada L.")),
                "students.example.edu",
            )
            .await
            .unwrap();
        assert_eq!(again.id, student.id);
        assert_eq!(again.name, "Ada L.");

        let teacher = directory
            .sign_in(&assertion("grace@example.edu", Some("Grace")), "students.example.edu")
            .await
            .unwrap();
        assert_eq!(teacher.role, Role::Teacher);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_email() {
        let h = Harness::new().await;
        let err = h
            .engine
            .principals
            .sign_in(&assertion("not-an-email", None), "students.example.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

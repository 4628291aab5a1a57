// src/models/user.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Principal role, decided at sign-in from the email domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Emails under the student domain are students; everyone else teaches.
    pub fn classify(email: &str, student_domain: &str) -> Self {
        let suffix = format!("@{}", student_domain.to_ascii_lowercase());
        if email.to_ascii_lowercase().ends_with(&suffix) {
            Role::Student
        } else {
            Role::Teacher
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Represents the 'principals' table in the database.
/// Anchors the principal's enrollment container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claims carried by the identity provider's signed assertion.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IdentityAssertion {
    /// Subject id at the identity provider.
    #[validate(length(min = 1, max = 255))]
    pub sub: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub name: Option<String>,
    pub exp: usize,
}

/// DTO for the identity callback.
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub assertion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_domain() {
        assert_eq!(
            Role::classify("n123@Students.Example.edu", "students.example.edu"),
            Role::Student
        );
        assert_eq!(
            Role::classify("prof@example.edu", "students.example.edu"),
            Role::Teacher
        );
        // Domain must match after the '@', not merely as a suffix.
        assert_eq!(
            Role::classify("x@evilstudents.example.edu", "students.example.edu"),
            Role::Teacher
        );
    }
}

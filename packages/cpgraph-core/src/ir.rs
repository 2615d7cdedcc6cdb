//! Per-method unit graphs supplied by the analysis frontend.
//!
//! The frontend lifts each method body into an ordered statement sequence.
//! Only the shapes the build core reacts to are modelled: call expressions
//! (plain or on the right side of an assignment) and statements the
//! frontend failed to lift, which poison the owning unit.

use serde::{Deserialize, Serialize};

/// Fully qualified method signature, e.g. `com.example.Foo.bar:int(int)`.
pub type MethodSignature = String;

/// A call expression with a build-stable instruction identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Stable identity of the call instruction within the build.
    pub id: String,
    /// Callee name as written at the call site.
    pub name: String,
    /// Source text of the call expression.
    pub code: String,
}

impl CallSite {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Right side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignValue {
    Call(CallSite),
    Expr(String),
}

/// One lifted IR statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// A call expression in statement position.
    Call(CallSite),
    /// An assignment; the right side may itself be a call expression.
    Assign { target: String, value: AssignValue },
    /// A return, with an optional returned expression.
    Return { value: Option<String> },
    /// A statement the frontend could not lift.
    Invalid { reason: String },
}

impl Statement {
    /// The call expression carried by this statement, looking through
    /// assignments the way the frontend points at the enclosing statement
    /// when the call is on the right side.
    pub fn as_call(&self) -> Option<&CallSite> {
        match self {
            Statement::Call(call) => Some(call),
            Statement::Assign {
                value: AssignValue::Call(call),
                ..
            } => Some(call),
            _ => None,
        }
    }
}

/// Ordered IR statement sequence for one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitGraph {
    pub method: MethodSignature,
    pub declaring_type: String,
    pub statements: Vec<Statement>,
}

impl UnitGraph {
    pub fn new(method: impl Into<MethodSignature>, declaring_type: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            declaring_type: declaring_type.into(),
            statements: Vec::new(),
        }
    }

    pub fn with_statements(mut self, statements: Vec<Statement>) -> Self {
        self.statements = statements;
        self
    }
}

/// Short method name of a signature: the segment after the last `.` of the
/// part before any `:` descriptor.
pub fn short_name(signature: &str) -> &str {
    let base = signature.split(':').next().unwrap_or(signature);
    base.rsplit('.').next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_call_looks_through_assignments() {
        let call = CallSite::new("c1", "helper", "helper()");
        let plain = Statement::Call(call.clone());
        let assigned = Statement::Assign {
            target: "x".to_string(),
            value: AssignValue::Call(call.clone()),
        };
        let expr = Statement::Assign {
            target: "y".to_string(),
            value: AssignValue::Expr("x + 1".to_string()),
        };

        assert_eq!(plain.as_call(), Some(&call));
        assert_eq!(assigned.as_call(), Some(&call));
        assert_eq!(expr.as_call(), None);
        assert_eq!(Statement::Return { value: None }.as_call(), None);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("com.example.Foo.bar:int(int)"), "bar");
        assert_eq!(short_name("Foo.main"), "main");
        assert_eq!(short_name("main"), "main");
    }

    #[test]
    fn test_unit_graph_serde() {
        let unit = UnitGraph::new("A.f", "A").with_statements(vec![Statement::Call(
            CallSite::new("c1", "g", "g()"),
        )]);
        let json = serde_json::to_string(&unit).unwrap();
        let back: UnitGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
    }
}

//! Scripted stand-ins for the functions a lowered body calls.

use crate::value::{RtValue, Thrown};
use sf_core::ty::Ty;
use std::collections::HashMap;

/// Results of a host call, or the exception it raised.
pub type HostResult = std::result::Result<Vec<RtValue>, Thrown>;

type HostFn = Box<dyn FnMut(&[RtValue]) -> HostResult + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub callee: String,
    pub args: Vec<RtValue>,
}

/// Host functions plus a log of every call made to them. Unknown callees succeed without
/// results.
#[derive(Default)]
pub struct Host {
    functions: HashMap<String, HostFn>,
    calls: Vec<CallRecord>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(&[RtValue]) -> HostResult + Send + 'static,
    ) -> &mut Self {
        self.functions.insert(name.into(), Box::new(f));
        self
    }

    pub fn returning(&mut self, name: impl Into<String>, values: Vec<RtValue>) -> &mut Self {
        self.register(name, move |_| Ok(values.clone()))
    }

    /// `name` raises an exception of type `ty` every time it is called.
    pub fn throwing(&mut self, name: impl Into<String>, ty: Ty, payload: RtValue) -> &mut Self {
        let thrown = Thrown { ty, payload };
        self.register(name, move |_| Err(thrown.clone()))
    }

    pub fn call(&mut self, callee: &str, args: &[RtValue]) -> HostResult {
        self.calls.push(CallRecord {
            callee: callee.to_string(),
            args: args.to_vec(),
        });
        match self.functions.get_mut(callee) {
            Some(f) => f(args),
            None => Ok(Vec::new()),
        }
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn count(&self, callee: &str) -> usize {
        self.calls.iter().filter(|call| call.callee == callee).count()
    }

    /// Callee names in call order.
    pub fn trace(&self) -> Vec<&str> {
        self.calls.iter().map(|call| call.callee.as_str()).collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("calls", &self.calls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_and_scripted_results() {
        let mut host = Host::new();
        host.returning("answer", vec![RtValue::Int(42)])
            .throwing("fail", Ty::String, RtValue::from("boom"));

        assert_eq!(host.call("answer", &[]), Ok(vec![RtValue::Int(42)]));
        assert_eq!(host.call("unknown", &[RtValue::Bool(true)]), Ok(vec![]));
        let thrown = host.call("fail", &[]).unwrap_err();
        assert_eq!(thrown.payload, RtValue::from("boom"));
        assert_eq!(host.trace(), vec!["answer", "unknown", "fail"]);
        assert_eq!(host.count("fail"), 1);
    }
}

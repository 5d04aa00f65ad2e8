//! Parameter lists and argument matching.
//!
//! A [`Signature`] is validated once when a function is defined; every call
//! then matches its positional arguments against it:
//!
//! - arguments bind to parameters in order
//! - trailing parameters with defaults may be omitted
//! - a single trailing rest parameter collects every extra argument
//! - declared parameter Types are checked against each supplied argument

use std::fmt;

use crate::{
    exception_private::{ErrorKind, ExcType, RunError, RunResult, RuntimeError},
    heap::Heap,
    value::Value,
};

/// One declared parameter.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    /// Declared Type; arguments must be instances of it.
    pub ty: Option<Value>,
    pub default: Option<Value>,
    /// Collects all remaining positional arguments as a list.
    pub rest: bool,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
            rest: false,
        }
    }

    #[must_use]
    pub fn with_type(mut self, ty: Value) -> Self {
        self.ty = Some(ty);
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }
}

/// Reasons a parameter list is rejected at definition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SignatureError {
    RequiredAfterDefault { param: String, previous: String },
    RestNotLast(String),
    RestWithDefault(String),
    DuplicateParam(String),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredAfterDefault { param, previous } => write!(
                f,
                "parameter '{param}' without a default follows parameter '{previous}' with a default"
            ),
            Self::RestNotLast(name) => write!(f, "rest parameter '{name}' must be the last parameter"),
            Self::RestWithDefault(name) => {
                write!(f, "rest parameter '{name}' cannot be combined with default values")
            }
            Self::DuplicateParam(name) => write!(f, "duplicate parameter '{name}'"),
        }
    }
}

impl From<SignatureError> for RunError {
    fn from(err: SignatureError) -> Self {
        ExcType::ArgumentError.msg(err.to_string())
    }
}

/// Arguments matched against a signature.
#[derive(Debug)]
pub(crate) struct MatchedArgs {
    /// One value per non-rest parameter, defaults filled in.
    pub fixed: Vec<Value>,
    /// Values collected by the rest parameter, if the signature has one.
    pub rest: Option<Vec<Value>>,
}

impl MatchedArgs {
    /// Flattens into a single positional list (rest values appended).
    pub fn into_flat(self) -> Vec<Value> {
        let mut out = self.fixed;
        out.extend(self.rest.into_iter().flatten());
        out
    }
}

/// A validated parameter list.
#[derive(Debug, Clone, Default)]
pub(crate) struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Validates and builds a signature.
    ///
    /// Rejects a required parameter after a defaulted one, a rest parameter
    /// that is not last (which also rules out more than one), a rest parameter
    /// mixed with defaults, and duplicate names.
    pub fn new(params: Vec<Param>) -> Result<Self, SignatureError> {
        let mut previous_default: Option<&str> = None;
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateParam(param.name.clone()));
            }
            if param.rest {
                if i + 1 != params.len() {
                    return Err(SignatureError::RestNotLast(param.name.clone()));
                }
                if param.default.is_some() || previous_default.is_some() {
                    return Err(SignatureError::RestWithDefault(param.name.clone()));
                }
            } else if param.default.is_some() {
                previous_default = Some(param.name.as_str());
            } else if let Some(previous) = previous_default {
                return Err(SignatureError::RequiredAfterDefault {
                    param: param.name.clone(),
                    previous: previous.to_owned(),
                });
            }
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn has_rest(&self) -> bool {
        self.params.last().is_some_and(|p| p.rest)
    }

    /// Number of non-rest parameters.
    pub fn positional_count(&self) -> usize {
        self.params.len() - usize::from(self.has_rest())
    }

    /// Number of parameters without a default.
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| !p.rest && p.default.is_none()).count()
    }

    /// Whether a call with exactly `count` positional arguments can match.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required_count() && (self.has_rest() || count <= self.positional_count())
    }

    /// Matches call arguments against the parameters.
    ///
    /// `bound` is the number of leading arguments supplied by method binding;
    /// it only adjusts the counts reported in error messages.
    ///
    /// # Errors
    /// `ArgumentCountError` for too many or too few arguments, `TypeError`
    /// (carrying `argument` and `expected`) for a declared-type mismatch.
    pub fn match_args(&self, heap: &Heap, func_name: &str, args: Vec<Value>, bound: usize) -> RunResult<MatchedArgs> {
        let positional = self.positional_count();
        if args.len() > positional && !self.has_rest() {
            return Err(ExcType::too_many_args(
                func_name,
                positional.saturating_sub(bound),
                args.len().saturating_sub(bound),
            ));
        }

        let mut args = args.into_iter();
        let mut fixed = Vec::with_capacity(positional);
        for param in &self.params[..positional] {
            let value = match args.next() {
                Some(value) => value,
                None => match param.default {
                    Some(default) => default,
                    None => return Err(ExcType::missing_arg(func_name, &param.name)),
                },
            };
            check_type(heap, func_name, param, value)?;
            fixed.push(value);
        }

        let rest = if self.has_rest() {
            let param = &self.params[positional];
            let collected: Vec<Value> = args.collect();
            for &value in &collected {
                check_type(heap, func_name, param, value)?;
            }
            Some(collected)
        } else {
            None
        };
        Ok(MatchedArgs { fixed, rest })
    }
}

fn check_type(heap: &Heap, func_name: &str, param: &Param, value: Value) -> RunResult<()> {
    let Some(expected) = param.ty else {
        return Ok(());
    };
    if heap.is_instance(value, expected) {
        return Ok(());
    }
    let error = RuntimeError::new(
        ErrorKind::Builtin(ExcType::TypeError),
        format!(
            "{func_name}() argument '{}' must be {}, not {}",
            param.name,
            heap.type_name_of_type(expected),
            heap.type_name(value)
        ),
    )
    .with_payload("argument", value)
    .with_payload("expected", expected);
    Err(error.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    fn with_default(heap: &mut Heap, name: &str) -> Param {
        let default = heap.int(0).unwrap();
        Param::new(name).with_default(default)
    }

    #[test]
    fn required_after_default_is_rejected() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let err = Signature::new(vec![with_default(&mut heap, "a"), Param::new("b")]).unwrap_err();
        assert_eq!(
            err,
            SignatureError::RequiredAfterDefault {
                param: "b".to_owned(),
                previous: "a".to_owned()
            }
        );
        let run_error: RunError = err.into();
        assert!(run_error.is_exception_type(ExcType::ArgumentError));
    }

    #[test]
    fn rest_rules() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        assert_eq!(
            Signature::new(vec![Param::new("xs").rest(), Param::new("y")]).unwrap_err(),
            SignatureError::RestNotLast("xs".to_owned())
        );
        assert_eq!(
            Signature::new(vec![with_default(&mut heap, "a"), Param::new("xs").rest()]).unwrap_err(),
            SignatureError::RestWithDefault("xs".to_owned())
        );
        assert!(Signature::new(vec![Param::new("a"), Param::new("xs").rest()]).is_ok());
    }

    #[test]
    fn matching_fills_defaults_and_rest() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let sig = Signature::new(vec![Param::new("a"), with_default(&mut heap, "b")]).unwrap();
        let one = heap.int(1).unwrap();
        let matched = sig.match_args(&heap, "f", vec![one], 0).unwrap();
        assert_eq!(matched.fixed.len(), 2);
        assert_eq!(matched.fixed[0], one);
        assert!(matched.rest.is_none());

        let variadic = Signature::new(vec![Param::new("a"), Param::new("xs").rest()]).unwrap();
        let matched = variadic.match_args(&heap, "g", vec![one, one, one], 0).unwrap();
        assert_eq!(matched.rest.map(|r| r.len()), Some(2));
    }

    #[test]
    fn count_mismatches() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let sig = Signature::new(vec![Param::new("a")]).unwrap();
        let one = heap.int(1).unwrap();
        let too_many = sig.match_args(&heap, "f", vec![one, one], 0).unwrap_err();
        assert!(too_many.is_exception_type(ExcType::ArgumentCountError));
        let too_few = sig.match_args(&heap, "f", vec![], 0).unwrap_err();
        assert!(too_few.is_exception_type(ExcType::ArgumentCountError));
        assert!(sig.accepts(1));
        assert!(!sig.accepts(2));
    }
}

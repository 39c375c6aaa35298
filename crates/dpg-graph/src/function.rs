//! # Functions
//!
//! A `Function` is an opaque, type-tagged map between carrier values. The
//! graph never looks inside it; it only checks that the declared input and
//! output types line up with the surrounding domains.

use std::fmt;
use std::sync::Arc;

use dpg_core::{Carrier, Fallible, RuntimeType, Value};

type DynFn = dyn Fn(&Value) -> Fallible<Value> + Send + Sync;

/// A type-tagged map from one carrier to another.
#[derive(Clone)]
pub struct Function {
    input_type: RuntimeType,
    output_type: RuntimeType,
    function: Arc<DynFn>,
}

impl Function {
    /// Wrap a dynamic closure with explicit carrier types.
    pub fn new(
        input_type: RuntimeType,
        output_type: RuntimeType,
        function: impl Fn(&Value) -> Fallible<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            input_type,
            output_type,
            function: Arc::new(function),
        }
    }

    /// Wrap a native closure. Carrier types come from `I` and `O`.
    pub fn new_typed<I: Carrier, O: Carrier>(
        function: impl Fn(&I) -> Fallible<O> + Send + Sync + 'static,
    ) -> Self {
        Self::new(I::runtime_type(), O::runtime_type(), move |arg| {
            let input = I::from_value(arg)?;
            function(&input).map(Carrier::into_value)
        })
    }

    /// The function that returns its argument.
    pub fn identity(ty: RuntimeType) -> Self {
        Self::new(ty.clone(), ty, |arg| Ok(arg.clone()))
    }

    /// Apply the function.
    pub fn eval(&self, arg: &Value) -> Fallible<Value> {
        (self.function)(arg)
    }

    /// `outer ∘ inner`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if `inner`'s output type is not `outer`'s input type.
    pub fn make_chain(outer: &Function, inner: &Function) -> Fallible<Function> {
        RuntimeType::assert_is_similar(&outer.input_type, &inner.output_type)?;
        let (f0, f1) = (inner.function.clone(), outer.function.clone());
        Ok(Self {
            input_type: inner.input_type.clone(),
            output_type: outer.output_type.clone(),
            function: Arc::new(move |arg| f1(&f0(arg)?)),
        })
    }

    pub fn input_type(&self) -> &RuntimeType {
        &self.input_type
    }

    pub fn output_type(&self) -> &RuntimeType {
        &self.output_type
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

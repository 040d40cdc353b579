// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Typed step [`Handler`]s.
//!
//! A handler is any `Fn` whose parameters come from the closed set of
//! [`StepParam`] types, optionally preceded by a [`Context`], and whose
//! return type converts via [`IntoOutcome`]. Signature validity is checked
//! by the compiler at the registration call site; no reflection happens at
//! run time.

use sealed::sealed;

use crate::{
    error::Failure,
    pickle::{DocString, Table},
    step::args::{ParamType, Value},
    Context,
};

/// Result of invoking a step handler.
#[derive(Debug)]
pub enum Outcome {
    /// Step passed; carries the (possibly extended) [`Context`] for the
    /// next step.
    Passed(Context),

    /// Step failed (or asked for a retry, or reported itself pending).
    Failed(Failure),

    /// Step expanded into nested step texts to be resolved and executed
    /// in its place, with the [`Context`] they start from.
    Nested(Vec<String>, Context),
}

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Implemented for `()`, [`Context`], `Vec<String>` (nested step texts)
/// and `Result`s thereof whose error converts into a [`Failure`].
#[sealed]
pub trait IntoOutcome {
    /// Converts the return value, given the [`Context`] the step ran with.
    #[must_use]
    fn into_outcome(self, ctx: Context) -> Outcome;
}

#[sealed]
impl IntoOutcome for () {
    fn into_outcome(self, ctx: Context) -> Outcome {
        Outcome::Passed(ctx)
    }
}

#[sealed]
impl IntoOutcome for Context {
    fn into_outcome(self, _: Context) -> Outcome {
        Outcome::Passed(self)
    }
}

#[sealed]
impl IntoOutcome for Vec<String> {
    fn into_outcome(self, ctx: Context) -> Outcome {
        Outcome::Nested(self, ctx)
    }
}

#[sealed]
impl<E: Into<Failure>> IntoOutcome for Result<(), E> {
    fn into_outcome(self, ctx: Context) -> Outcome {
        match self {
            Ok(()) => Outcome::Passed(ctx),
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}

#[sealed]
impl<E: Into<Failure>> IntoOutcome for Result<Context, E> {
    fn into_outcome(self, _: Context) -> Outcome {
        match self {
            Ok(ctx) => Outcome::Passed(ctx),
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}

#[sealed]
impl<E: Into<Failure>> IntoOutcome for Result<Vec<String>, E> {
    fn into_outcome(self, ctx: Context) -> Outcome {
        match self {
            Ok(steps) => Outcome::Nested(steps, ctx),
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}

/// Parameter type a handler may declare (besides a leading [`Context`]).
#[sealed]
pub trait StepParam: Sized {
    /// [`ParamType`] tag the binder converts captures with.
    const TYPE: ParamType;

    /// Unwraps the bound [`Value`].
    ///
    /// The binder produced the value from `Self::TYPE`, so the variant
    /// always lines up.
    #[must_use]
    fn from_value(value: Value) -> Self;
}

macro_rules! impl_step_param {
    ($ty:ty, $variant:ident) => {
        #[sealed]
        impl StepParam for $ty {
            const TYPE: ParamType = ParamType::$variant;

            fn from_value(value: Value) -> Self {
                match value {
                    Value::$variant(v) => v,
                    _ => unreachable!("binder produced a mismatched value"),
                }
            }
        }
    };
}

impl_step_param!(i8, I8);
impl_step_param!(i16, I16);
impl_step_param!(i32, I32);
impl_step_param!(i64, I64);
impl_step_param!(f32, F32);
impl_step_param!(f64, F64);
impl_step_param!(String, String);
impl_step_param!(Vec<u8>, Bytes);
impl_step_param!(DocString, DocString);
impl_step_param!(Table, Table);

/// Marker for handlers not taking a [`Context`].
#[derive(Clone, Copy, Debug)]
pub enum Plain {}

/// Marker for handlers taking a leading [`Context`].
#[derive(Clone, Copy, Debug)]
pub enum WithCtx {}

/// A callable step body.
///
/// The `Marker` type parameter only disambiguates overlapping `Fn`
/// signatures (with/without a leading [`Context`]); it is inferred at the
/// registration call site and never named by users.
pub trait Handler<Marker>: Send + Sync + 'static {
    /// Parameter types the binder must produce, in order, excluding the
    /// leading [`Context`] (if any).
    #[must_use]
    fn param_types() -> Vec<ParamType>;

    /// Invokes the handler with bound `values` (one per
    /// [`Self::param_types()`] entry, same order).
    #[must_use]
    fn call(&self, ctx: Context, values: Vec<Value>) -> Outcome;
}

macro_rules! impl_handler {
    ($($param:ident),*) => {
        impl<F, R, $($param,)*> Handler<(Plain, R, $($param,)*)> for F
        where
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
            $($param: StepParam,)*
        {
            fn param_types() -> Vec<ParamType> {
                vec![$($param::TYPE),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, ctx: Context, values: Vec<Value>) -> Outcome {
                let mut values = values.into_iter();
                let ret = self($($param::from_value(
                    values.next().unwrap_or_else(|| {
                        unreachable!("binder produced too few values")
                    }),
                )),*);
                ret.into_outcome(ctx)
            }
        }

        impl<F, R, $($param,)*> Handler<(WithCtx, R, $($param,)*)> for F
        where
            F: Fn(Context, $($param),*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
            $($param: StepParam,)*
        {
            fn param_types() -> Vec<ParamType> {
                vec![$($param::TYPE),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, ctx: Context, values: Vec<Value>) -> Outcome {
                let mut values = values.into_iter();
                let ret = self(ctx.clone(), $($param::from_value(
                    values.next().unwrap_or_else(|| {
                        unreachable!("binder produced too few values")
                    }),
                )),*);
                ret.into_outcome(ctx)
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);

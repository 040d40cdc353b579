// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Binding of regex captures onto a handler's typed parameters.

use derive_more::{Display, Error};

use crate::pickle::{DocString, StepArgument, Table};

/// Parameter type a step handler declares.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ParamType {
    #[display("i8")]
    I8,
    #[display("i16")]
    I16,
    #[display("i32")]
    I32,
    #[display("i64")]
    I64,
    #[display("f32")]
    F32,
    #[display("f64")]
    F64,
    #[display("String")]
    String,
    #[display("Vec<u8>")]
    Bytes,
    #[display("DocString")]
    DocString,
    #[display("Table")]
    Table,
}

impl ParamType {
    /// Indicates whether this parameter is fed by the pickle step's
    /// structured argument rather than a capture group.
    #[must_use]
    pub fn is_structured(self) -> bool {
        matches!(self, Self::DocString | Self::Table)
    }
}

/// Concrete value bound to one handler parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    DocString(DocString),
    Table(Table),
}

/// Failure to convert a capture (or structured argument) into the declared
/// parameter type. Reported as the step's failure cause.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
pub enum BindError {
    /// Handler wants a different number of values than the match produced.
    #[display(
        "step definition expects {expected} argument{}, but the text \
         captured {captured}",
        if *expected == 1 { "" } else { "s" }
    )]
    CountMismatch { expected: usize, captured: usize },

    /// Captured text does not parse as the declared type.
    #[display("cannot convert `{value}` into `{target}`")]
    Conversion {
        #[error(not(source))]
        value: String,
        target: ParamType,
    },

    /// Handler declares a doc string parameter, but the step carries none
    /// (or carries a table).
    #[display("step definition expects a doc string, but the step has none")]
    MissingDocString,

    /// Handler declares a table parameter, but the step carries none (or
    /// carries a doc string).
    #[display("step definition expects a data table, but the step has none")]
    MissingTable,
}

/// Binds regex `captures` (and the step's structured `argument`, if the
/// trailing parameter asks for one) onto `params`.
///
/// Integer captures parse in base 10 and are range-checked against the
/// declared width; a leading `Context` parameter is not part of `params`
/// and never consumes a capture.
pub(crate) fn bind(
    captures: &[String],
    argument: Option<&StepArgument>,
    params: &[ParamType],
) -> Result<Vec<Value>, BindError> {
    let structured = params.last().copied().filter(|p| p.is_structured());
    let plain = &params[..params.len() - usize::from(structured.is_some())];

    if plain.len() != captures.len() {
        return Err(BindError::CountMismatch {
            expected: plain.len(),
            captured: captures.len(),
        });
    }

    let mut values = Vec::with_capacity(params.len());
    for (param, capture) in plain.iter().zip(captures) {
        values.push(convert(capture, *param)?);
    }
    if let Some(structured) = structured {
        values.push(bind_structured(argument, structured)?);
    }
    Ok(values)
}

fn bind_structured(
    argument: Option<&StepArgument>,
    param: ParamType,
) -> Result<Value, BindError> {
    match (param, argument) {
        (ParamType::DocString, Some(StepArgument::DocString(doc))) => {
            Ok(Value::DocString(doc.clone()))
        }
        (ParamType::Table, Some(StepArgument::Table(table))) => {
            Ok(Value::Table(table.clone()))
        }
        (ParamType::DocString, _) => Err(BindError::MissingDocString),
        (ParamType::Table, _) => Err(BindError::MissingTable),
        _ => unreachable!("`bind_structured` is only called for structured params"),
    }
}

fn convert(capture: &str, param: ParamType) -> Result<Value, BindError> {
    let conversion = || BindError::Conversion {
        value: capture.to_owned(),
        target: param,
    };
    Ok(match param {
        ParamType::I8 => Value::I8(capture.parse::<i8>().map_err(|_| conversion())?),
        ParamType::I16 => Value::I16(capture.parse::<i16>().map_err(|_| conversion())?),
        ParamType::I32 => Value::I32(capture.parse::<i32>().map_err(|_| conversion())?),
        ParamType::I64 => Value::I64(capture.parse::<i64>().map_err(|_| conversion())?),
        ParamType::F32 => Value::F32(capture.parse::<f32>().map_err(|_| conversion())?),
        ParamType::F64 => Value::F64(capture.parse::<f64>().map_err(|_| conversion())?),
        ParamType::String => Value::String(capture.to_owned()),
        ParamType::Bytes => Value::Bytes(capture.as_bytes().to_owned()),
        ParamType::DocString | ParamType::Table => {
            unreachable!("structured params never consume captures")
        }
    })
}

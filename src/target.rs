use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, WorkflowError};

/// Argument and result element exchanged between targets.
pub type Value = serde_json::Value;

/// Number of arguments a target accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(&self, passed: usize) -> bool {
        match self {
            Arity::Fixed(expected) => *expected == passed,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(count) => write!(f, "{}", count),
            Arity::Variadic => f.write_str("variadic"),
        }
    }
}

/// Conversion of a callable's return value into a result list.
///
/// `()` becomes an empty list, tuples contribute one element per field and
/// every other supported type contributes exactly one element.
pub trait IntoValues {
    fn into_values(self) -> std::result::Result<Vec<Value>, String>;
}

impl IntoValues for () {
    fn into_values(self) -> std::result::Result<Vec<Value>, String> {
        Ok(Vec::new())
    }
}

fn encode<T: Serialize>(value: T) -> std::result::Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("unable to encode result: {}", err))
}

macro_rules! impl_into_values_single {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValues for $ty {
                fn into_values(self) -> std::result::Result<Vec<Value>, String> {
                    Ok(vec![encode(self)?])
                }
            }
        )*
    };
}

impl_into_values_single!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, Value,
);

impl<T: Serialize> IntoValues for Vec<T> {
    fn into_values(self) -> std::result::Result<Vec<Value>, String> {
        Ok(vec![encode(self)?])
    }
}

impl<T: Serialize> IntoValues for Option<T> {
    fn into_values(self) -> std::result::Result<Vec<Value>, String> {
        Ok(vec![encode(self)?])
    }
}

macro_rules! impl_into_values_tuple {
    ($($field:ident: $ty:ident),+) => {
        impl<$($ty: Serialize),+> IntoValues for ($($ty,)+) {
            fn into_values(self) -> std::result::Result<Vec<Value>, String> {
                let ($($field,)+) = self;
                Ok(vec![$(encode($field)?),+])
            }
        }
    };
}

impl_into_values_tuple!(a: A, b: B);
impl_into_values_tuple!(a: A, b: B, c: C);
impl_into_values_tuple!(a: A, b: B, c: C, d: D);

impl<T, E> IntoValues for std::result::Result<T, E>
where
    T: IntoValues,
    E: fmt::Display,
{
    fn into_values(self) -> std::result::Result<Vec<Value>, String> {
        self.map_err(|err| err.to_string())?.into_values()
    }
}

/// A Rust function usable as a target; `Args` is the parameter tuple.
pub trait Callable<Args>: Send + Sync + 'static {
    fn arity(&self) -> usize;
    fn call(&self, args: Vec<Value>) -> std::result::Result<Vec<Value>, String>;
}

fn decode<T: DeserializeOwned>(index: usize, value: Value) -> std::result::Result<T, String> {
    serde_json::from_value(value).map_err(|err| format!("argument {}: {}", index, err))
}

macro_rules! impl_callable {
    ($($arg:ident: $ty:ident),*) => {
        impl<F, R, $($ty,)*> Callable<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoValues,
            $($ty: DeserializeOwned,)*
        {
            fn arity(&self) -> usize {
                <[&str]>::len(&[$(stringify!($ty)),*])
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, args: Vec<Value>) -> std::result::Result<Vec<Value>, String> {
                let expected = Callable::<($($ty,)*)>::arity(self);
                if args.len() != expected {
                    return Err(format!(
                        "expected {} arguments, got {}",
                        expected,
                        args.len()
                    ));
                }
                let mut args = args.into_iter().enumerate();
                $(
                    let $arg: $ty = match args.next() {
                        Some((index, value)) => decode(index, value)?,
                        None => return Err("missing argument".to_string()),
                    };
                )*
                (self)($($arg),*).into_values()
            }
        }
    };
}

impl_callable!();
impl_callable!(a1: A1);
impl_callable!(a1: A1, a2: A2);
impl_callable!(a1: A1, a2: A2, a3: A3);
impl_callable!(a1: A1, a2: A2, a3: A3, a4: A4);
impl_callable!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_callable!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
impl_callable!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7);
impl_callable!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8);

type Invoke = dyn Fn(Vec<Value>) -> std::result::Result<Vec<Value>, String> + Send + Sync;

/// Type-erased callable with a known arity.
#[derive(Clone)]
pub struct Target {
    name: Arc<str>,
    arity: Arity,
    invoke: Arc<Invoke>,
}

impl Target {
    /// Wraps a function taking up to eight deserializable parameters.
    pub fn new<F, Args>(func: F) -> Self
    where
        F: Callable<Args>,
    {
        let arity = Arity::Fixed(func.arity());
        Self {
            name: Arc::from(std::any::type_name::<F>()),
            arity,
            invoke: Arc::new(move |args: Vec<Value>| func.call(args)),
        }
    }

    /// Wraps a function taking every passed argument as one list.
    pub fn variadic<F, T, R>(func: F) -> Self
    where
        F: Fn(Vec<T>) -> R + Send + Sync + 'static,
        T: DeserializeOwned,
        R: IntoValues,
    {
        Self {
            name: Arc::from(std::any::type_name::<F>()),
            arity: Arity::Variadic,
            invoke: Arc::new(move |args: Vec<Value>| {
                let operands = args
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| decode(index, value))
                    .collect::<std::result::Result<Vec<T>, String>>()?;
                func(operands).into_values()
            }),
        }
    }

    pub fn named(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn check_args(&self, passed: usize) -> Result<()> {
        match self.arity {
            Arity::Fixed(expected) if expected != passed => Err(WorkflowError::ArgumentMismatch {
                target: self.name.to_string(),
                expected,
                passed,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>> {
        (self.invoke)(args).map_err(|message| WorkflowError::Target {
            target: self.name.to_string(),
            message,
        })
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Conversion into a [`Target`]; implemented for plain functions and for `Target` itself.
pub trait IntoTarget<Marker> {
    fn into_target(self) -> Target;
}

impl IntoTarget<Target> for Target {
    fn into_target(self) -> Target {
        self
    }
}

impl<F, Args> IntoTarget<(Args,)> for F
where
    F: Callable<Args>,
{
    fn into_target(self) -> Target {
        Target::new(self)
    }
}

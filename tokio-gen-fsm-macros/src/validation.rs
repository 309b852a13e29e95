//! Validation logic for behavior impl blocks.

use syn::{Error, FnArg, Ident, ImplItem, ImplItemFn, ReturnType, Type};

use crate::attrs::BehaviorArgs;
use crate::helpers;

/// What a method returns, mirrored by the runtime's `ReturnShape`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Unit,
    State,
    StateAndDuration,
    Other,
}

impl Shape {
    fn of(output: &ReturnType) -> Self {
        let ty = match output {
            ReturnType::Default => return Self::Unit,
            ReturnType::Type(_, ty) => ty.as_ref(),
        };
        match ty {
            Type::Tuple(tuple) if tuple.elems.is_empty() => Self::Unit,
            Type::Tuple(tuple)
                if tuple.elems.len() == 2
                    && helpers::is_named(&tuple.elems[0], "State")
                    && helpers::is_duration(&tuple.elems[1]) =>
            {
                Self::StateAndDuration
            }
            ty if helpers::is_named(ty, "State") => Self::State,
            _ => Self::Other,
        }
    }

    pub fn is_transition(self) -> bool {
        matches!(self, Self::State | Self::StateAndDuration)
    }
}

/// How an invoker hands the event arguments to the method.
#[derive(Debug, Clone)]
pub enum Params {
    /// One owned parameter per argument, unpacked positionally.
    Typed(Vec<Type>),
    /// A single `Args` parameter receiving the raw list.
    Raw,
}

impl Params {
    /// Parses the non-receiver parameters, or `None` if one is borrowed.
    fn parse(method: &ImplItemFn) -> Option<Self> {
        let types: Vec<Type> = method
            .sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(pat) => Some((*pat.ty).clone()),
                FnArg::Receiver(_) => None,
            })
            .collect();

        if let [only] = types.as_slice() {
            if helpers::is_named(only, "Args") {
                return Some(Self::Raw);
            }
        }
        types.iter().all(helpers::is_owned).then_some(Self::Typed(types))
    }
}

/// A method of the behavior, described for the operation table.
#[derive(Debug, Clone)]
pub struct OperationDef {
    pub ident: Ident,
    pub shape: Shape,
    pub is_async: bool,
    /// Present when the runtime can call the method.
    pub params: Option<Params>,
}

impl OperationDef {
    fn parse(method: &ImplItemFn) -> Self {
        let shape = Shape::of(&method.sig.output);
        let params = if shape.is_transition() && has_ref_receiver(method) {
            Params::parse(method)
        } else {
            None
        };
        Self {
            ident: method.sig.ident.clone(),
            shape,
            is_async: method.sig.asyncness.is_some(),
            params,
        }
    }
}

/// The initialization method.
#[derive(Debug, Clone)]
pub struct InitDef {
    pub ident: Ident,
    pub params: Params,
}

/// Represents the complete behavior after parsing.
#[derive(Debug)]
pub struct BehaviorStructure {
    pub self_ty: Type,
    pub crate_path: syn::Path,
    pub init: InitDef,
    pub operations: Vec<OperationDef>,
}

impl BehaviorStructure {
    /// Parse the impl block and extract every operation.
    pub fn parse(args: BehaviorArgs, impl_block: &syn::ItemImpl) -> syn::Result<Self> {
        if let Some((_, path, _)) = &impl_block.trait_ {
            return Err(Error::new_spanned(
                path,
                "#[behavior] goes on an inherent impl block, not a trait impl",
            ));
        }
        if !impl_block.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &impl_block.generics,
                "generic behaviors are not supported",
            ));
        }

        let mut init = None;
        let mut operations = Vec::new();

        for item in &impl_block.items {
            let ImplItem::Fn(method) = item else {
                continue;
            };
            if method.sig.ident == args.init {
                init = Some(parse_init(method)?);
            } else {
                operations.push(OperationDef::parse(method));
            }
        }

        let init = init.ok_or_else(|| {
            Error::new_spanned(
                &impl_block.self_ty,
                format!("missing initialization method: fn {}(&mut self, ..) -> State", args.init),
            )
        })?;

        Ok(Self {
            self_ty: (*impl_block.self_ty).clone(),
            crate_path: args.crate_path,
            init,
            operations,
        })
    }
}

fn parse_init(method: &ImplItemFn) -> syn::Result<InitDef> {
    if method.sig.asyncness.is_some() {
        return Err(Error::new_spanned(
            method.sig.asyncness,
            "the initialization method cannot be async",
        ));
    }
    if !has_ref_receiver(method) {
        return Err(Error::new_spanned(
            &method.sig,
            "the initialization method must take &mut self or &self",
        ));
    }
    if Shape::of(&method.sig.output) != Shape::State {
        return Err(Error::new_spanned(
            &method.sig.output,
            "the initialization method must return State",
        ));
    }
    let params = Params::parse(method).ok_or_else(|| {
        Error::new_spanned(
            &method.sig.inputs,
            "initialization parameters must be owned types",
        )
    })?;
    Ok(InitDef {
        ident: method.sig.ident.clone(),
        params,
    })
}

fn has_ref_receiver(method: &ImplItemFn) -> bool {
    matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some()
    )
}

//! Proc macro enumerating the operations of a tokio-gen-fsm behavior.

use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

mod attrs;
mod codegen;
mod helpers;
mod validation;

/// Implements `Behavior` for the type of an inherent `impl` block.
///
/// The block must contain an initialization method (`init` unless renamed
/// with `#[behavior(init = "...")]`) returning `State`. Every other method is
/// listed as an operation; methods named `State_Event` that return `State`,
/// `(State, Duration)` or `(State, Option<Duration>)` become transition
/// handlers once the runtime resolves them. Handlers may be `async`, take
/// `&self` or `&mut self`, and take owned parameters that are unpacked
/// positionally from the event arguments, or a single `Args` parameter that
/// receives them unchecked.
#[proc_macro_attribute]
pub fn behavior(args: TokenStream, input: TokenStream) -> TokenStream {
    let input_impl = parse_macro_input!(input as ItemImpl);

    let behavior_args = match NestedMeta::parse_meta_list(args.into())
        .map_err(darling::Error::from)
        .and_then(|list| attrs::BehaviorArgs::from_list(&list))
    {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    match generate_behavior(behavior_args, &input_impl) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_behavior(
    args: attrs::BehaviorArgs,
    input: &ItemImpl,
) -> syn::Result<proc_macro2::TokenStream> {
    // Parse the behavior structure
    let structure = validation::BehaviorStructure::parse(args, input)?;

    // Generate the code
    Ok(codegen::generate(&structure, input))
}

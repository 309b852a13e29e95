//! Code generation for the behavior implementation.

use proc_macro2::TokenStream;
use quote::quote;

use crate::helpers;
use crate::validation::{BehaviorStructure, OperationDef, Params, Shape};

/// Generate the original impl block, the hidden invokers and the
/// `Behavior` implementation.
pub fn generate(behavior: &BehaviorStructure, original_impl: &syn::ItemImpl) -> TokenStream {
    let self_ty = &behavior.self_ty;
    let krate = &behavior.crate_path;

    let invokers: Vec<_> = behavior
        .operations
        .iter()
        .filter_map(|op| render_invoker(behavior, op))
        .collect();
    let operations: Vec<_> = behavior
        .operations
        .iter()
        .map(|op| render_operation(behavior, op))
        .collect();
    let initialize = render_initialize(behavior);

    quote! {
        #[allow(non_snake_case)]
        #original_impl

        #[allow(non_snake_case)]
        impl #self_ty {
            #(#invokers)*
        }

        impl #krate::Behavior for #self_ty {
            #initialize

            fn operations() -> ::std::vec::Vec<#krate::Operation<Self>> {
                ::std::vec![
                    #(#operations,)*
                ]
            }
        }
    }
}

fn render_shape(behavior: &BehaviorStructure, shape: Shape) -> TokenStream {
    let krate = &behavior.crate_path;
    match shape {
        Shape::Unit => quote! { #krate::ReturnShape::Unit },
        Shape::State => quote! { #krate::ReturnShape::State },
        Shape::StateAndDuration => quote! { #krate::ReturnShape::StateAndDuration },
        Shape::Other => quote! { #krate::ReturnShape::Other },
    }
}

fn render_operation(behavior: &BehaviorStructure, op: &OperationDef) -> TokenStream {
    let krate = &behavior.crate_path;
    let name = op.ident.to_string();
    let shape = render_shape(behavior, op.shape);

    if op.params.is_some() {
        let invoker = helpers::invoker_ident(&op.ident);
        quote! { #krate::Operation::handler(#name, #shape, Self::#invoker) }
    } else {
        quote! { #krate::Operation::opaque(#name, #shape) }
    }
}

/// Unpacks `args` into locals and returns the call arguments.
fn render_unpack(params: &Params) -> (TokenStream, TokenStream) {
    match params {
        Params::Raw => (quote! {}, quote! { __args }),
        Params::Typed(types) => {
            let count = types.len();
            let idents: Vec<_> = (0..count).map(helpers::arg_ident).collect();
            let indices = 0..count;
            (
                quote! {
                    __args.expect_len(#count)?;
                    #(let #idents: #types = __args.take(#indices)?;)*
                },
                quote! { #(#idents),* },
            )
        }
    }
}

fn render_invoker(behavior: &BehaviorStructure, op: &OperationDef) -> Option<TokenStream> {
    let params = op.params.as_ref()?;
    let krate = &behavior.crate_path;
    let method = &op.ident;
    let invoker = helpers::invoker_ident(method);
    let (unpack, call_args) = render_unpack(params);
    let call = if op.is_async {
        quote! { __fsm.#method(#call_args).await }
    } else {
        quote! { __fsm.#method(#call_args) }
    };

    Some(quote! {
        #[doc(hidden)]
        #[allow(unused_mut)]
        fn #invoker<'__fsm>(
            __fsm: &'__fsm mut Self,
            mut __args: #krate::Args,
        ) -> #krate::HandlerFuture<'__fsm> {
            ::std::boxed::Box::pin(async move {
                #unpack
                let __ret = #call;
                ::core::result::Result::<#krate::Transition, #krate::InvocationError>::Ok(
                    #krate::IntoTransition::into_transition(__ret),
                )
            })
        }
    })
}

fn render_initialize(behavior: &BehaviorStructure) -> TokenStream {
    let krate = &behavior.crate_path;
    let init = &behavior.init.ident;
    let (unpack, call_args) = render_unpack(&behavior.init.params);

    quote! {
        #[allow(unused_mut)]
        fn initialize(
            &mut self,
            mut __args: #krate::Args,
        ) -> ::core::result::Result<#krate::State, #krate::InvocationError> {
            #unpack
            ::core::result::Result::Ok(Self::#init(self, #call_args))
        }
    }
}

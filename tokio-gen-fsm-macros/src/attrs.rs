//! Attribute parsing for the behavior macro.

use darling::FromMeta;

/// Arguments for the `#[behavior]` attribute.
#[derive(Debug, FromMeta)]
pub struct BehaviorArgs {
    /// Name of the initialization method (default: `init`).
    #[darling(default = "default_init")]
    pub init: String,

    /// Path of the runtime crate (default: `::tokio_gen_fsm`).
    #[darling(rename = "crate", default = "default_crate_path")]
    pub crate_path: syn::Path,
}

fn default_init() -> String {
    "init".to_owned()
}

fn default_crate_path() -> syn::Path {
    syn::parse_quote!(::tokio_gen_fsm)
}

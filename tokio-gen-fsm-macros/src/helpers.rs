use quote::format_ident;
use syn::{GenericArgument, Ident, PathArguments, Type};

/// Generates the identifier of an operation's hidden invoker: `__gen_fsm_[method]`
pub fn invoker_ident(method: &Ident) -> Ident {
    format_ident!("__gen_fsm_{}", method)
}

/// Generates the identifier bound to the `index`th unpacked argument.
pub fn arg_ident(index: usize) -> Ident {
    format_ident!("__arg{}", index)
}

/// Whether `ty` is a path whose last segment is `name`, ignoring generics.
pub fn is_named(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|seg| seg.ident == name)
}

/// Whether `ty` is `Duration` or `Option<Duration>`.
pub fn is_duration(ty: &Type) -> bool {
    if is_named(ty, "Duration") {
        return true;
    }
    let Some(seg) = last_segment(ty).filter(|seg| seg.ident == "Option") else {
        return false;
    };
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return false;
    };
    matches!(
        args.args.first(),
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 && is_named(inner, "Duration")
    )
}

/// Whether values of `ty` can be moved out of an event's argument list.
pub fn is_owned(ty: &Type) -> bool {
    match ty {
        Type::Reference(_) | Type::ImplTrait(_) | Type::Infer(_) | Type::Never(_) => false,
        Type::Paren(inner) => is_owned(&inner.elem),
        Type::Group(inner) => is_owned(&inner.elem),
        Type::Tuple(tuple) => tuple.elems.iter().all(is_owned),
        Type::Array(array) => is_owned(&array.elem),
        _ => true,
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        Type::Paren(inner) => last_segment(&inner.elem),
        Type::Group(inner) => last_segment(&inner.elem),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn recognizes_durations() {
        assert!(is_duration(&parse_quote!(Duration)));
        assert!(is_duration(&parse_quote!(std::time::Duration)));
        assert!(is_duration(&parse_quote!(Option<Duration>)));
        assert!(!is_duration(&parse_quote!(Option<u64>)));
        assert!(!is_duration(&parse_quote!(u64)));
    }

    #[test]
    fn borrowed_types_are_not_owned() {
        assert!(is_owned(&parse_quote!(char)));
        assert!(is_owned(&parse_quote!((u32, String))));
        assert!(!is_owned(&parse_quote!(&str)));
        assert!(!is_owned(&parse_quote!((u32, &str))));
        assert!(!is_owned(&parse_quote!(impl Fn())));
    }
}

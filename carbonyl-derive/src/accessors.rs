use quote::quote;
use syn::ext::IdentExt;

use crate::{is_json_attr, member_tokens, parse_json_attrs};

/// Names every type already answers to, never published as members.
const RESERVED: &[&str] = &["type_id", "type_name"];

pub(crate) fn expand(mut item: syn::ItemImpl) -> syn::Result<proc_macro2::TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "accessors must be placed on an inherent impl block",
        ));
    }

    let mut visits = Vec::new();
    for impl_item in &mut item.items {
        let syn::ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let attrs = parse_json_attrs(&method.attrs)?;
        method.attrs.retain(|attr| !is_json_attr(attr));

        if attrs.ignore || !is_accessor(&method.vis, &method.sig) {
            continue;
        }
        let ident = &method.sig.ident;
        let name = ident.unraw().to_string();
        let member = member_tokens(quote! { accessor }, &name, attrs.rename.as_deref());

        let visit = if returns_result(&method.sig.output) {
            quote! {
                match self.#ident() {
                    ::core::result::Result::Ok(value) => {
                        visitor.visit(&#member, ::core::result::Result::Ok(&value))?;
                    }
                    ::core::result::Result::Err(err) => {
                        let err = ::carbonyl_core::AccessError::new(
                            ::std::string::ToString::to_string(&err),
                        );
                        visitor.visit(&#member, ::core::result::Result::Err(err))?;
                    }
                }
            }
        } else {
            quote! {
                {
                    let value = self.#ident();
                    visitor.visit(&#member, ::core::result::Result::Ok(&value))?;
                }
            }
        };
        visits.push(visit);
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::carbonyl_core::Introspect for #self_ty #where_clause {
            fn visit_members(
                &self,
                visitor: &mut dyn ::carbonyl_core::MemberVisitor,
            ) -> ::core::result::Result<(), ::carbonyl_core::Error> {
                #(#visits)*
                ::core::result::Result::Ok(())
            }
        }

        impl #impl_generics ::carbonyl_core::Wrap for #self_ty #where_clause {
            fn host(&self) -> ::carbonyl_core::Host<'_> {
                ::carbonyl_core::Host::Object(self)
            }
        }
    })
}

fn is_accessor(vis: &syn::Visibility, sig: &syn::Signature) -> bool {
    if !matches!(vis, syn::Visibility::Public(_)) {
        return false;
    }
    if sig.asyncness.is_some() || sig.unsafety.is_some() || sig.variadic.is_some() {
        return false;
    }
    if sig.generics.type_params().next().is_some() || sig.generics.const_params().next().is_some() {
        return false;
    }
    if RESERVED.contains(&sig.ident.unraw().to_string().as_str()) {
        return false;
    }

    let mut inputs = sig.inputs.iter();
    let shared_self = matches!(
        inputs.next(),
        Some(syn::FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none()
    );
    if !shared_self || inputs.next().is_some() {
        return false;
    }

    match &sig.output {
        syn::ReturnType::Default => false,
        syn::ReturnType::Type(_, ty) => !is_unit(ty),
    }
}

fn is_unit(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Tuple(tuple) => tuple.elems.is_empty(),
        syn::Type::Paren(inner) => is_unit(&inner.elem),
        syn::Type::Never(_) => true,
        _ => false,
    }
}

fn returns_result(output: &syn::ReturnType) -> bool {
    let syn::ReturnType::Type(_, ty) = output else {
        return false;
    };
    let syn::Type::Path(type_path) = ty.as_ref() else {
        return false;
    };
    type_path
        .path
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "Result")
}

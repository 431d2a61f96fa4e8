use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DeriveInput, parse_macro_input};

mod accessors;

/// Derive macro for the Introspect trait.
///
/// Every named field becomes a member keyed by the field name. The type
/// also gets a `Wrap` implementation, so it can be nested inside other
/// values.
///
/// # Example
///
/// ```ignore
/// use carbonyl_core::Introspect;
///
/// #[derive(Introspect)]
/// struct Point {
///     x: i32,
///     #[json(rename = "ordinate")]
///     y: i32,
///     #[json(ignore)]
///     cached_norm: f64,
/// }
/// ```
///
/// # Attributes
///
/// - `#[json(rename = "key")]` - Publish the field under `key`
/// - `#[json(ignore)]` - Leave the field out
///
/// A type deriving `Introspect` cannot also use `#[accessors]`, since both
/// provide the same trait implementations.
#[proc_macro_derive(Introspect, attributes(json))]
pub fn derive_introspect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_introspect_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive macro for the Fields trait: lookup of named fields by name.
///
/// Fields marked `#[json(ignore)]` cannot be looked up.
#[proc_macro_derive(Fields, attributes(json))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_fields_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive macro for the Wrap trait on fieldless enums.
///
/// Each variant is published as its name, or as its `#[json(rename = "..")]`.
#[proc_macro_derive(Wrap, attributes(json))]
pub fn derive_wrap(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_wrap_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Attribute macro for an inherent `impl` block, exposing its getters as members.
///
/// A method is a member when it is `pub`, takes only `&self`, has no type
/// parameters, is neither `async` nor `unsafe`, and returns a value. Its key
/// comes from the method name: `get_name`/`is_valid` and
/// `getName`/`isValid` publish `name` and `valid`. Methods returning
/// `Result` publish the `Ok` value; an `Err` skips the member.
///
/// # Example
///
/// ```ignore
/// use carbonyl_core::accessors;
///
/// struct Gauge { raw: i64 }
///
/// #[accessors]
/// impl Gauge {
///     pub fn get_value(&self) -> i64 { self.raw }
///
///     #[json(rename = "unit")]
///     pub fn unit_name(&self) -> &str { "mV" }
///
///     #[json(ignore)]
///     pub fn get_raw(&self) -> i64 { self.raw }
/// }
/// ```
#[proc_macro_attribute]
pub fn accessors(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = proc_macro2::TokenStream::from(attr);
    if !attr.is_empty() {
        return syn::Error::new_spanned(attr, "accessors takes no arguments")
            .to_compile_error()
            .into();
    }
    let item = parse_macro_input!(item as syn::ItemImpl);

    match accessors::expand(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> syn::Result<&'a syn::punctuated::Punctuated<syn::Field, syn::Token![,]>> {
    match &input.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(named),
            ..
        }) => Ok(&named.named),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{derive} can only be derived for structs with named fields"),
        )),
    }
}

fn derive_introspect_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = build_where_clause(&input.generics, where_clause);

    let mut visits = Vec::new();
    for field in named_fields(input, "Introspect")? {
        let attrs = parse_json_attrs(&field.attrs)?;
        if attrs.ignore {
            continue;
        }
        let Some(ident) = &field.ident else { continue };
        let key = ident.unraw().to_string();
        let member = member_tokens(quote! { field }, &key, attrs.rename.as_deref());
        visits.push(quote! {
            visitor.visit(&#member, ::core::result::Result::Ok(&self.#ident))?;
        });
    }

    Ok(quote! {
        impl #impl_generics ::carbonyl_core::Introspect for #name #ty_generics #where_clause {
            fn visit_members(
                &self,
                visitor: &mut dyn ::carbonyl_core::MemberVisitor,
            ) -> ::core::result::Result<(), ::carbonyl_core::Error> {
                #(#visits)*
                ::core::result::Result::Ok(())
            }
        }

        impl #impl_generics ::carbonyl_core::Wrap for #name #ty_generics #where_clause {
            fn host(&self) -> ::carbonyl_core::Host<'_> {
                ::carbonyl_core::Host::Object(self)
            }
        }
    })
}

fn derive_fields_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = build_where_clause(&input.generics, where_clause);

    let mut names = Vec::new();
    let mut arms = Vec::new();
    for field in named_fields(input, "Fields")? {
        if parse_json_attrs(&field.attrs)?.ignore {
            continue;
        }
        let Some(ident) = &field.ident else { continue };
        let key = ident.unraw().to_string();
        arms.push(quote! {
            #key => ::core::option::Option::Some(&self.#ident),
        });
        names.push(key);
    }

    Ok(quote! {
        impl #impl_generics ::carbonyl_core::Fields for #name #ty_generics #where_clause {
            fn field_names(&self) -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn field(&self, name: &str) -> ::core::option::Option<&dyn ::carbonyl_core::Wrap> {
                match name {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn derive_wrap_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let syn::Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Wrap can only be derived for enums; use Introspect for structs",
        ));
    };

    let mut arms = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, syn::Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Wrap can only be derived for enums without fields",
            ));
        }
        let attrs = parse_json_attrs(&variant.attrs)?;
        let ident = &variant.ident;
        let text = attrs.rename.unwrap_or_else(|| ident.unraw().to_string());
        arms.push(quote! { Self::#ident => #text, });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::carbonyl_core::Wrap for #name #ty_generics #where_clause {
            fn host(&self) -> ::carbonyl_core::Host<'_> {
                let text: &str = match self {
                    #(#arms)*
                };
                ::carbonyl_core::Host::Text(::std::string::ToString::to_string(text))
            }
        }
    })
}

/// Requires every type parameter to be wrappable.
fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let wrap_bounds = type_params.iter().map(|p| {
        quote! { #p: ::carbonyl_core::Wrap }
    });

    let existing_predicates = existing
        .filter(|w| !w.predicates.is_empty())
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #existing_predicates
            #(#wrap_bounds),*
    }
}

/// `Member::<kind>(name)` with the rename applied, if any.
pub(crate) fn member_tokens(
    kind: proc_macro2::TokenStream,
    name: &str,
    rename: Option<&str>,
) -> proc_macro2::TokenStream {
    match rename {
        Some(key) => quote! { ::carbonyl_core::Member::#kind(#name).renamed(#key) },
        None => quote! { ::carbonyl_core::Member::#kind(#name) },
    }
}

#[derive(Default)]
pub(crate) struct JsonAttrs {
    pub ignore: bool,
    pub rename: Option<String>,
}

pub(crate) fn is_json_attr(attr: &syn::Attribute) -> bool {
    attr.path().is_ident("json")
}

pub(crate) fn parse_json_attrs(attrs: &[syn::Attribute]) -> syn::Result<JsonAttrs> {
    let mut result = JsonAttrs::default();

    for attr in attrs.iter().filter(|attr| is_json_attr(attr)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ignore") {
                result.ignore = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `ignore` or `rename = \"...\"`"))
            }
        })?;
    }

    Ok(result)
}

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, GenericParam, Ident, Type, parse_quote};

use crate::attr::{ContainerAttrs, FieldAttrs, RenameRule};

// derive_graphql_object
pub fn derive_graphql_object(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    expand(&input).unwrap_or_else(Error::into_compile_error)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let container = ContainerAttrs::parse(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "GraphqlObject can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "GraphqlObject can only be derived for structs with named fields",
            ));
        }
    };

    let type_name = container
        .name
        .clone()
        .unwrap_or_else(|| ident.to_string());

    let mut descriptors = Vec::new();
    let mut remainder: Option<&Ident> = None;
    let mut field_types = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let ty = &field.ty;
        let remain = attrs.flatten && is_map(ty);
        if remain {
            if remainder.is_some() {
                return Err(Error::new_spanned(
                    field_ident,
                    "only one field can receive the remaining response members",
                ));
            }
            remainder = Some(field_ident);
        }

        let rust_name = field_ident.to_string();
        let rust_name = rust_name.trim_start_matches("r#");
        let tag = field_tag(rust_name, &attrs, remain, container.rename_all);

        descriptors.push(quote! {
            ::cti_graphql::FieldDescriptor::new(
                #rust_name,
                #tag,
                <#ty as ::cti_graphql::GraphqlField>::shape(),
            )
        });
        field_types.push(ty.clone());
    }

    // Field bounds only on generic structs: a concrete recursive type would
    // otherwise depend on its own impl.
    let mut generics = input.generics.clone();
    let mut generic = false;
    for param in &mut generics.params {
        if let GenericParam::Type(param) = param {
            param.bounds.push(parse_quote!('static));
            generic = true;
        }
    }
    if generic {
        let where_clause = generics.make_where_clause();
        for ty in &field_types {
            where_clause
                .predicates
                .push(parse_quote!(#ty: ::cti_graphql::GraphqlField));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let implementations = &container.implementations;
    let implementations_fn = if implementations.is_empty() {
        quote!()
    } else {
        quote! {
            fn implementations() -> ::std::vec::Vec<::cti_graphql::TypeRef> {
                ::std::vec![#(::cti_graphql::TypeRef::of::<#implementations>()),*]
            }
        }
    };

    let interface_impl = if implementations.is_empty() {
        quote!()
    } else {
        let body = remainder.map_or_else(
            || quote!(::cti_graphql::ResponseData::new()),
            |field| quote!(::cti_graphql::decode::to_remainder(&self.#field)),
        );
        quote! {
            impl #impl_generics ::cti_graphql::GraphqlInterface for #ident #ty_generics #where_clause {
                fn remainder(&self) -> ::cti_graphql::ResponseData {
                    #body
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::cti_graphql::GraphqlObject for #ident #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> ::std::vec::Vec<::cti_graphql::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #implementations_fn
        }

        impl #impl_generics ::cti_graphql::GraphqlField for #ident #ty_generics #where_clause {
            fn shape() -> ::cti_graphql::FieldShape {
                ::cti_graphql::FieldShape::Object(::cti_graphql::TypeRef::of::<Self>())
            }
        }

        #interface_impl
    })
}

// Tags follow `name[,(args)]`; flattened fields carry only a directive.
fn field_tag(
    rust_name: &str,
    attrs: &FieldAttrs,
    remain: bool,
    rename_all: Option<RenameRule>,
) -> String {
    if remain {
        return ",remain".to_string();
    }
    if attrs.flatten {
        return ",squash".to_string();
    }

    let name = attrs.name.clone().unwrap_or_else(|| {
        rename_all.map_or_else(|| rust_name.to_string(), |rule| rule.apply(rust_name))
    });

    match attrs.args.as_deref().map(str::trim) {
        Some(args) if args.starts_with('(') => format!("{name},{args}"),
        Some(args) if !args.is_empty() => format!("{name},({args})"),
        _ => name,
    }
}

fn is_map(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path
        .segments
        .last()
        .is_some_and(|segment| matches!(segment.ident.to_string().as_str(), "Map" | "HashMap" | "BTreeMap"))
}

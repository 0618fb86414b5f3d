extern crate proc_macro;
extern crate quote;
extern crate syn;

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Token, Type, spanned::Spanned};

fn unwrap_attr(attrs: &[Attribute], ident: &str) -> Option<TokenStream2> {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident(ident))
        .and_then(|attr| {
            if let syn::Meta::List(list) = &attr.meta {
                Some(list.tokens.clone())
            } else {
                None
            }
        })
}

/// Parsed `#[output("name", "description"[, default])]` attribute.
struct OutputAttr {
    name: LitStr,
    description: LitStr,
    is_default: bool,
}

impl Parse for OutputAttr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: LitStr = input.parse()?;
        if name.value().is_empty() {
            return Err(syn::Error::new(name.span(), "Output name cannot be empty"));
        }

        input.parse::<Token![,]>()?;
        let description: LitStr = input.parse()?;

        if !input.peek(Token![,]) {
            return Ok(OutputAttr {
                name,
                description,
                is_default: false,
            });
        }
        input.parse::<Token![,]>()?;

        let default_ident: Ident = input.parse()?;
        if default_ident != "default" {
            return Err(syn::Error::new(
                default_ident.span(),
                format!("Expected 'default', found '{}'", default_ident),
            ));
        }

        Ok(OutputAttr {
            name,
            description,
            is_default: true,
        })
    }
}

/// Shape of an output field.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    /// Monophonic `f32` port
    Mono,
    /// Single `PolyOutput` port
    Poly,
    /// `[PolyOutput; N]`, exposed as ports `name1`..`nameN`
    PolyArray,
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(tp) => tp.path.segments.last().map(|seg| seg.ident.to_string()),
        Type::Group(g) => last_ident(&g.elem),
        Type::Paren(p) => last_ident(&p.elem),
        _ => None,
    }
}

fn output_kind(ty: &Type) -> Option<OutputKind> {
    match ty {
        Type::Array(arr) => match last_ident(&arr.elem).as_deref() {
            Some("PolyOutput") => Some(OutputKind::PolyArray),
            _ => None,
        },
        _ => match last_ident(ty).as_deref() {
            Some("f32") => Some(OutputKind::Mono),
            Some("PolyOutput") => Some(OutputKind::Poly),
            _ => None,
        },
    }
}

struct OutputField {
    field_name: Ident,
    attr: OutputAttr,
    kind: OutputKind,
}

fn collect_outputs(ast: &DeriveInput) -> syn::Result<Vec<OutputField>> {
    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields,
            Fields::Unnamed(_) | Fields::Unit => {
                return Err(syn::Error::new(
                    Span::call_site(),
                    "Outputs can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new(
                Span::call_site(),
                "Outputs can only be derived for structs",
            ));
        }
    };

    let mut out = Vec::new();
    for f in fields.named.iter() {
        let field_name = f
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(f.span(), "Expected named field"))?;

        let tokens = unwrap_attr(&f.attrs, "output").ok_or_else(|| {
            syn::Error::new(
                f.span(),
                "Every field in an Outputs struct must be annotated with #[output(...)]",
            )
        })?;
        let attr: OutputAttr = syn::parse2(tokens)?;

        let kind = output_kind(&f.ty).ok_or_else(|| {
            syn::Error::new(
                f.ty.span(),
                "Output fields must have type f32, PolyOutput or [PolyOutput; N]",
            )
        })?;

        out.push(OutputField {
            field_name,
            attr,
            kind,
        });
    }

    let default_count = out.iter().filter(|o| o.attr.is_default).count();
    if default_count > 1 {
        return Err(syn::Error::new(
            Span::call_site(),
            format!(
                "Outputs struct '{}' has {} outputs marked as default, but only one is allowed",
                ast.ident, default_count
            ),
        ));
    }

    Ok(out)
}

/// Derives `crate::types::OutputStruct` (and `Default`) for a struct of
/// output ports annotated with `#[output("name", "description"[, default])]`.
#[proc_macro_derive(Outputs, attributes(output))]
pub fn outputs_macro_derive(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(e) => return e.to_compile_error().into(),
    };
    match impl_outputs_macro(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn impl_outputs_macro(ast: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &ast.ident;
    let outputs = collect_outputs(ast)?;

    let field_defaults: Vec<_> = outputs
        .iter()
        .map(|o| {
            let field_name = &o.field_name;
            match o.kind {
                OutputKind::Mono => quote! { #field_name: 0.0 },
                OutputKind::Poly => quote! { #field_name: crate::poly::PolyOutput::default() },
                OutputKind::PolyArray => quote! {
                    #field_name: ::core::array::from_fn(|_| crate::poly::PolyOutput::default())
                },
            }
        })
        .collect();

    let lookups: Vec<_> = outputs
        .iter()
        .map(|o| {
            let port = &o.attr.name;
            let field_name = &o.field_name;
            match o.kind {
                OutputKind::Mono => quote! {
                    if port == #port {
                        return Some(crate::poly::PolyOutput::mono(self.#field_name));
                    }
                },
                OutputKind::Poly => quote! {
                    if port == #port {
                        return Some(self.#field_name);
                    }
                },
                OutputKind::PolyArray => quote! {
                    if let Some(index) = port
                        .strip_prefix(#port)
                        .and_then(|rest| rest.parse::<usize>().ok())
                    {
                        if index >= 1 && index <= self.#field_name.len() {
                            return Some(self.#field_name[index - 1]);
                        }
                    }
                },
            }
        })
        .collect();

    let schema_stmts: Vec<_> = outputs
        .iter()
        .map(|o| {
            let port = &o.attr.name;
            let description = &o.attr.description;
            let is_default = o.attr.is_default;
            let field_name = &o.field_name;
            match o.kind {
                OutputKind::Mono | OutputKind::Poly => {
                    let polyphonic = o.kind == OutputKind::Poly;
                    quote! {
                        schemas.push(crate::types::OutputSchema {
                            name: #port.to_string(),
                            description: #description.to_string(),
                            default: #is_default,
                            polyphonic: #polyphonic,
                        });
                    }
                }
                OutputKind::PolyArray => quote! {
                    for index in 1..=template.#field_name.len() {
                        schemas.push(crate::types::OutputSchema {
                            name: format!("{}{}", #port, index),
                            description: format!("{} ({})", #description, index),
                            default: #is_default && index == 1,
                            polyphonic: true,
                        });
                    }
                },
            }
        })
        .collect();

    Ok(quote! {
        impl Default for #name {
            fn default() -> Self {
                Self {
                    #(#field_defaults,)*
                }
            }
        }

        impl crate::types::OutputStruct for #name {
            fn get_poly_sample(&self, port: &str) -> Option<crate::poly::PolyOutput> {
                #(#lookups)*
                None
            }

            fn schemas() -> Vec<crate::types::OutputSchema> {
                #[allow(unused_variables)]
                let template = Self::default();
                let mut schemas = Vec::new();
                #(#schema_stmts)*
                schemas
            }
        }
    })
}

//! Procedural macros for cropdyn module development
//!
//! The `ModuleIO` derive macro turns a declaration of a module's inputs and outputs into:
//! - Static metadata (`NAME`, `generated_definitions()`) that can be queried without an instance
//! - A typed `Inputs` struct built from the input values handed to `Module::evaluate`
//! - A typed `Outputs` struct that writes its fields back in declaration order
//!
//! # Example
//!
//! ```ignore
//! use cropdyn_core::module::{ModuleError, QuantityDefinition};
//! use cropdyn_core::ModuleIO;
//!
//! #[derive(Debug, Serialize, Deserialize, ModuleIO)]
//! #[module(name = "thermal_time_linear")]
//! #[inputs(
//!     temp { unit = "degrees C" },
//!     tbase { unit = "degrees C" },
//! )]
//! #[outputs(
//!     ttc { name = "TTc", unit = "degrees C * day / hr" },
//! )]
//! pub struct ThermalTimeLinear {}
//! ```
//!
//! This generates:
//! - `ThermalTimeLinearInputs` with `temp: f64` and `tbase: f64` fields
//! - `ThermalTimeLinearOutputs` with a `ttc: f64` field
//! - `ThermalTimeLinear::NAME` and `ThermalTimeLinear::generated_definitions()`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{braced, parse_macro_input, Attribute, Data, DeriveInput, Ident, LitStr, Token};

/// A single `field { name = "...", unit = "..." }` declaration
struct IoDeclaration {
    rust_name: Ident,
    quantity_name: String,
    unit: String,
}

impl Parse for IoDeclaration {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let rust_name: Ident = input.parse()?;
        let mut quantity_name = None;
        let mut unit = None;

        if input.peek(syn::token::Brace) {
            let content;
            braced!(content in input);
            while !content.is_empty() {
                let key: Ident = content.parse()?;
                content.parse::<Token![=]>()?;
                let value: LitStr = content.parse()?;
                match key.to_string().as_str() {
                    "name" => quantity_name = Some(value.value()),
                    "unit" => unit = Some(value.value()),
                    other => {
                        return Err(syn::Error::new(
                            key.span(),
                            format!("unknown key `{}`, expected `name` or `unit`", other),
                        ))
                    }
                }
                if content.is_empty() {
                    break;
                }
                content.parse::<Token![,]>()?;
            }
        }

        // Use the rust field name if no quantity name is given
        let quantity_name = quantity_name.unwrap_or_else(|| rust_name.to_string());
        let unit = unit.unwrap_or_default();

        Ok(Self {
            rust_name,
            quantity_name,
            unit,
        })
    }
}

fn parse_declarations(attrs: &[Attribute], ident: &str) -> syn::Result<Vec<IoDeclaration>> {
    let mut declarations = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident(ident)) {
        let parsed =
            attr.parse_args_with(Punctuated::<IoDeclaration, Token![,]>::parse_terminated)?;
        declarations.extend(parsed);
    }
    Ok(declarations)
}

/// Parse `#[module(name = "...")]`, falling back to the struct name
fn parse_module_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("module")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported module attribute, expected `name`"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| struct_name.to_string()))
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let inputs_name = format_ident!("{}Inputs", struct_name);
    let outputs_name = format_ident!("{}Outputs", struct_name);

    if !matches!(input.data, Data::Struct(_)) {
        return Err(syn::Error::new(
            struct_name.span(),
            "ModuleIO can only be derived for structs",
        ));
    }

    let module_name = parse_module_name(&input.attrs, struct_name)?;
    let inputs = parse_declarations(&input.attrs, "inputs")?;
    let outputs = parse_declarations(&input.attrs, "outputs")?;
    let n_inputs = inputs.len();

    let input_fields: Vec<&Ident> = inputs.iter().map(|d| &d.rust_name).collect();
    let output_fields: Vec<&Ident> = outputs.iter().map(|d| &d.rust_name).collect();

    let input_definitions: Vec<TokenStream2> = inputs
        .iter()
        .map(|d| {
            let name = &d.quantity_name;
            let unit = &d.unit;
            quote! { QuantityDefinition::input(#name, #unit) }
        })
        .collect();

    let output_definitions: Vec<TokenStream2> = outputs
        .iter()
        .map(|d| {
            let name = &d.quantity_name;
            let unit = &d.unit;
            quote! { QuantityDefinition::output(#name, #unit) }
        })
        .collect();

    // Read each input by position, rejecting non-finite values
    let input_reads: Vec<TokenStream2> = inputs
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let field = &d.rust_name;
            let name = &d.quantity_name;
            quote! {
                let #field = values[#i];
                if !#field.is_finite() {
                    return Err(ModuleError::NonFiniteInput {
                        quantity: #name.to_string(),
                        value: #field,
                    });
                }
            }
        })
        .collect();

    let output_writes: Vec<TokenStream2> = outputs
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let field = &d.rust_name;
            quote! { outputs[#i] = self.#field; }
        })
        .collect();

    let inputs_doc = format!("Input values for [`{}`]", struct_name);
    let outputs_doc = format!("Output values for [`{}`]", struct_name);

    Ok(quote! {
        #[doc = #inputs_doc]
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct #inputs_name {
            #(pub #input_fields: f64,)*
        }

        impl #inputs_name {
            /// Read the inputs from values given in declaration order
            pub fn from_values(values: &[f64]) -> Result<Self, ModuleError> {
                if values.len() != #n_inputs {
                    return Err(ModuleError::WrongInputCount {
                        expected: #n_inputs,
                        found: values.len(),
                    });
                }
                #(#input_reads)*
                Ok(Self { #(#input_fields,)* })
            }
        }

        #[doc = #outputs_doc]
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        pub struct #outputs_name {
            #(pub #output_fields: f64,)*
        }

        impl #outputs_name {
            /// Write the outputs in declaration order
            #[allow(unused_variables)]
            pub fn write_to(&self, outputs: &mut [f64]) {
                #(#output_writes)*
            }
        }

        impl #struct_name {
            pub const NAME: &'static str = #module_name;

            pub fn input_definitions() -> Vec<QuantityDefinition> {
                vec![#(#input_definitions,)*]
            }

            pub fn output_definitions() -> Vec<QuantityDefinition> {
                vec![#(#output_definitions,)*]
            }

            /// Returns the quantity definitions for this module, inputs first
            pub fn generated_definitions() -> Vec<QuantityDefinition> {
                let mut definitions = Self::input_definitions();
                definitions.extend(Self::output_definitions());
                definitions
            }
        }
    })
}

/// Derive macro for declaring the inputs and outputs of a module
///
/// # Attributes
///
/// - `#[module(name = "...")]` - Name reported by the module (defaults to the struct name)
/// - `#[inputs(field { name = "...", unit = "..." }, ...)]` - Quantities read by the module
/// - `#[outputs(field { name = "...", unit = "..." }, ...)]` - Quantities written by the module
///
/// `name` defaults to the field identifier and `unit` to an empty string.
/// The generated code refers to `ModuleError` and `QuantityDefinition`,
/// which must be in scope where the macro is used.
#[proc_macro_derive(ModuleIO, attributes(module, inputs, outputs))]
pub fn derive_module_io(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, LitStr};

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ident = &input.ident;
    let type_name = ident.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = if let Data::Struct(data) = &input.data {
        if let Fields::Named(named) = &data.fields {
            &named.named
        } else {
            let err = Error::new_spanned(
                &data.fields,
                "Entity can only be derived for structs with named fields",
            );
            return err.to_compile_error();
        }
    } else {
        let err = Error::new_spanned(
            &input.ident,
            "Entity can only be derived for structs with named fields",
        );
        return err.to_compile_error();
    };

    let mut descriptors = Vec::with_capacity(fields.len());
    for field in fields {
        match field_descriptor(field) {
            Ok(tokens) => descriptors.push(tokens),
            Err(err) => return err.to_compile_error(),
        }
    }

    let idents: Vec<_> = fields
        .iter()
        .map(|field| field.ident.as_ref().expect("named field"))
        .collect();
    let names: Vec<String> = idents.iter().map(ToString::to_string).collect();
    let indexes: Vec<usize> = (0..idents.len()).collect();

    quote! {
        impl #impl_generics ::quarry_orm::model::Describe for #ident #ty_generics #where_clause {
            fn describe() -> ::quarry_orm::model::TypeDescriptor {
                ::quarry_orm::model::TypeDescriptor::Record(
                    ::quarry_orm::model::RecordDescriptor {
                        name: #type_name,
                        fields: ::std::vec![#(#descriptors),*],
                    },
                )
            }
        }

        impl #impl_generics ::quarry_orm::model::Entity for #ident #ty_generics #where_clause {
            fn get_field(
                &self,
                name: &str,
            ) -> ::std::result::Result<::quarry_orm::value::Value, ::quarry_orm::error::ValueError> {
                use ::quarry_orm::value::SqlType;

                match name {
                    #(#names => ::std::result::Result::Ok(SqlType::to_value(&self.#idents)),)*
                    _ => ::std::result::Result::Err(::quarry_orm::error::ValueError::UnknownField {
                        field: name.to_string(),
                    }),
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: ::quarry_orm::value::Value,
            ) -> ::std::result::Result<(), ::quarry_orm::error::ValueError> {
                use ::quarry_orm::value::SqlType;

                match name {
                    #(#names => self.#idents = SqlType::from_value(value)?,)*
                    _ => {
                        return ::std::result::Result::Err(
                            ::quarry_orm::error::ValueError::UnknownField {
                                field: name.to_string(),
                            },
                        );
                    }
                }
                ::std::result::Result::Ok(())
            }

            fn get_at(
                &self,
                index: usize,
            ) -> ::std::result::Result<::quarry_orm::value::Value, ::quarry_orm::error::ValueError> {
                use ::quarry_orm::value::SqlType;

                match index {
                    #(#indexes => ::std::result::Result::Ok(SqlType::to_value(&self.#idents)),)*
                    _ => ::std::result::Result::Err(::quarry_orm::error::ValueError::UnknownField {
                        field: index.to_string(),
                    }),
                }
            }

            fn set_at(
                &mut self,
                index: usize,
                value: ::quarry_orm::value::Value,
            ) -> ::std::result::Result<(), ::quarry_orm::error::ValueError> {
                use ::quarry_orm::value::SqlType;

                match index {
                    #(#indexes => self.#idents = SqlType::from_value(value)?,)*
                    _ => {
                        return ::std::result::Result::Err(
                            ::quarry_orm::error::ValueError::UnknownField {
                                field: index.to_string(),
                            },
                        );
                    }
                }
                ::std::result::Result::Ok(())
            }
        }
    }
}

fn field_descriptor(field: &Field) -> syn::Result<TokenStream> {
    let ident = field.ident.as_ref().expect("named field");
    let name = ident.to_string();
    let ty = &field.ty;

    let tag = match field_tag(field)? {
        Some(tag) => quote!(::std::option::Option::Some(#tag)),
        None => quote!(::std::option::Option::None),
    };

    Ok(quote! {
        ::quarry_orm::model::FieldDescriptor {
            name: #name,
            tag: #tag,
            value_type: <#ty as ::quarry_orm::value::SqlType>::VALUE_TYPE,
            nullable: <#ty as ::quarry_orm::value::SqlType>::NULLABLE,
        }
    })
}

// #[orm(tag = "...")]
fn field_tag(field: &Field) -> syn::Result<Option<LitStr>> {
    let mut tag = None;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                tag = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported orm attribute, expected `tag`"))
            }
        })?;
    }
    Ok(tag)
}

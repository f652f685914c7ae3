use convert_case::{Case, Casing};
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Expr, LitStr, Path, Result, Token};

///
/// RenameRule
///

#[derive(Clone, Copy)]
pub enum RenameRule {
    Lower,
    Upper,
    Case(Case),
}

impl RenameRule {
    fn parse(value: &LitStr) -> Result<Self> {
        let rule = match value.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Case(Case::Pascal),
            "camelCase" => Self::Case(Case::Camel),
            "snake_case" => Self::Case(Case::Snake),
            "SCREAMING_SNAKE_CASE" => Self::Case(Case::UpperSnake),
            "kebab-case" => Self::Case(Case::Kebab),
            "SCREAMING-KEBAB-CASE" => Self::Case(Case::Cobol),
            other => {
                return Err(syn::Error::new_spanned(
                    value,
                    format!("unknown rename rule `{other}`"),
                ));
            }
        };
        Ok(rule)
    }

    pub fn apply(self, field: &str) -> String {
        match self {
            Self::Lower => field.to_lowercase(),
            Self::Upper => field.to_uppercase(),
            Self::Case(case) => field.to_case(case),
        }
    }
}

///
/// ContainerAttrs
///

#[derive(Default)]
pub struct ContainerAttrs {
    pub name: Option<String>,
    pub rename_all: Option<RenameRule>,
    pub implementations: Vec<Path>,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        let mut serde_name = None;

        for attr in attrs {
            if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        if let Some(rule) = deserialize_value(&meta)? {
                            out.rename_all = Some(RenameRule::parse(&rule)?);
                        }
                    } else if meta.path.is_ident("rename") {
                        serde_name = deserialize_value(&meta)?.map(|lit| lit.value());
                    } else {
                        skip_meta(&meta)?;
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("graphql") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.name = Some(value.value());
                    } else if meta.path.is_ident("implementations") {
                        meta.parse_nested_meta(|inner| {
                            out.implementations.push(inner.path);
                            Ok(())
                        })?;
                    } else {
                        return Err(meta.error("unsupported graphql container attribute"));
                    }
                    Ok(())
                })?;
            }
        }

        if out.name.is_none() {
            out.name = serde_name;
        }
        Ok(out)
    }
}

///
/// FieldAttrs
///

#[derive(Default)]
pub struct FieldAttrs {
    pub name: Option<String>,
    pub args: Option<String>,
    pub skip: bool,
    pub flatten: bool,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();

        for attr in attrs {
            if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        out.name = deserialize_value(&meta)?.map(|lit| lit.value());
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing")
                    {
                        out.skip = true;
                    } else if meta.path.is_ident("flatten") {
                        out.flatten = true;
                    } else {
                        skip_meta(&meta)?;
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("graphql") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("args") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.args = Some(value.value());
                    } else if meta.path.is_ident("skip") {
                        out.skip = true;
                    } else if meta.path.is_ident("name") {
                        return Err(meta.error(
                            "selected names follow serde, use `#[serde(rename = \"...\")]`",
                        ));
                    } else if meta.path.is_ident("remain") {
                        return Err(meta.error(
                            "remaining members are collected by a `#[serde(flatten)]` map field",
                        ));
                    } else {
                        return Err(meta.error("unsupported graphql field attribute"));
                    }
                    Ok(())
                })?;
            }
        }

        Ok(out)
    }
}

// `rename = "x"` or `rename(deserialize = "x")`; decoding follows the deserialize side.
fn deserialize_value(meta: &ParseNestedMeta) -> Result<Option<LitStr>> {
    if meta.input.peek(Token![=]) {
        return Ok(Some(meta.value()?.parse()?));
    }

    let mut value = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("deserialize") {
            value = Some(inner.value()?.parse()?);
        } else {
            skip_meta(&inner)?;
        }
        Ok(())
    })?;
    Ok(value)
}

fn skip_meta(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

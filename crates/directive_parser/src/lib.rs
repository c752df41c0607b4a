use eyre::eyre;

#[macro_export]
macro_rules! static_regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::OnceCell<fancy_regex::Regex> = once_cell::sync::OnceCell::new();
        RE.get_or_init(|| {
            fancy_regex::Regex::new($re)
                .expect(&format!("Malformed regex '{}'. This is a bug.", $re))
        })
    }};
}

pub type Result<T> = eyre::Result<T>;

/// A function call inside a directive, e.g. `render("nav", title = "Home")`.
#[derive(Clone, Debug, PartialEq)]
pub struct Call<'a> {
    name: &'a str,
    positional: Vec<serde_json::Value>,
    keywords: Vec<(&'a str, serde_json::Value)>,
}

impl<'a> Call<'a> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub fn positional(&self) -> &[serde_json::Value] {
        self.positional.as_ref()
    }

    #[must_use]
    pub fn keywords(&self) -> &[(&'a str, serde_json::Value)] {
        self.keywords.as_ref()
    }

    /// Returns the positional argument at `index` when it is a string.
    #[must_use]
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.positional.get(index).and_then(serde_json::Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr<'a> {
    /// `{{ yield }}`
    Yield,
    /// `{{ a.b.c }}`
    Lookup(Vec<&'a str>),
    /// `{{ name(args) }}`
    Call(Call<'a>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node<'a> {
    Text(&'a str),
    Expr(Expr<'a>),
    /// `{% name(args) %} body {% end %}`
    Block { call: Call<'a>, body: Vec<Node<'a>> },
}

pub fn parse(input: &str) -> Result<Vec<Node<'_>>> {
    let (nodes, _) = parse_nodes(input, false)?;
    Ok(nodes)
}

fn parse_nodes(input: &str, in_block: bool) -> Result<(Vec<Node<'_>>, &str)> {
    let mut nodes = vec![];
    let mut input = input;
    loop {
        let re = static_regex!(r"\{\{|\{%");
        match re.find(input)? {
            None => {
                if in_block {
                    return Err(eyre!("unterminated block: expected '{{% end %}}'"));
                }
                if !input.is_empty() {
                    nodes.push(Node::Text(input));
                }
                return Ok((nodes, ""));
            }
            Some(mat) => {
                if mat.start() > 0 {
                    nodes.push(Node::Text(&input[..mat.start()]));
                }
                let tag = &input[mat.start()..];
                if mat.as_str() == "{{" {
                    let (rest, expr) = parse::expr_tag(tag)
                        // map error because `nom` returns a borrow and we want to return owned values
                        .map_err(|e| eyre!("malformed expression: {}", e))?;
                    nodes.push(Node::Expr(expr));
                    input = rest;
                } else if let Ok((rest, _)) = parse::end_tag(tag) {
                    if in_block {
                        return Ok((nodes, rest));
                    }
                    return Err(eyre!("found '{{% end %}}' without an open block"));
                } else {
                    let (rest, call) =
                        parse::block_header(tag).map_err(|e| eyre!("malformed block: {}", e))?;
                    let (body, rest) = parse_nodes(rest, true)?;
                    nodes.push(Node::Block { call, body });
                    input = rest;
                }
            }
        }
    }
}


mod parse {
    use nom::{
        branch::alt,
        bytes::complete::{tag, take_until, take_while1},
        character::complete::{char, digit1, multispace0},
        combinator::{map, map_res, opt, recognize},
        error::ParseError,
        multi::{separated_list0, separated_list1},
        sequence::{delimited, pair, separated_pair, tuple},
        IResult,
    };

    use super::{Call, Expr};

    enum Arg<'a> {
        Positional(serde_json::Value),
        Keyword(&'a str, serde_json::Value),
    }

    fn ws<'a, F: 'a, O, E: ParseError<&'a str>>(
        inner: F,
    ) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
    where
        F: FnMut(&'a str) -> IResult<&'a str, O, E>,
    {
        delimited(multispace0, inner, multispace0)
    }

    fn ident_char(ch: char) -> bool {
        ch == '_' || ch == '-' || ch.is_alphanumeric()
    }

    fn ident(s: &str) -> IResult<&str, &str> {
        take_while1(ident_char)(s)
    }

    fn string_value(s: &str) -> IResult<&str, serde_json::Value> {
        map(delimited(tag("\""), take_until("\""), tag("\"")), |s: &str| {
            serde_json::Value::String(s.to_owned())
        })(s)
    }

    fn bool_value(s: &str) -> IResult<&str, serde_json::Value> {
        alt((
            map(tag("true"), |_| serde_json::Value::Bool(true)),
            map(tag("false"), |_| serde_json::Value::Bool(false)),
        ))(s)
    }

    fn number_value(s: &str) -> IResult<&str, serde_json::Value> {
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(serde_json::Value::from)
        })(s)
    }

    fn value(s: &str) -> IResult<&str, serde_json::Value> {
        alt((string_value, bool_value, number_value))(s)
    }

    fn arg(s: &str) -> IResult<&str, Arg<'_>> {
        alt((
            map(separated_pair(ident, ws(tag("=")), value), |(k, v)| {
                Arg::Keyword(k, v)
            }),
            map(value, Arg::Positional),
        ))(s)
    }

    fn call(s: &str) -> IResult<&str, Call<'_>> {
        map(
            tuple((
                ident,
                ws(tag("(")),
                separated_list0(ws(tag(",")), arg),
                ws(tag(")")),
            )),
            |(name, _, args, _)| {
                let mut positional = vec![];
                let mut keywords = vec![];
                for arg in args {
                    match arg {
                        Arg::Positional(v) => positional.push(v),
                        Arg::Keyword(k, v) => keywords.push((k, v)),
                    }
                }
                Call {
                    name,
                    positional,
                    keywords,
                }
            },
        )(s)
    }

    fn lookup(s: &str) -> IResult<&str, Expr<'_>> {
        map(separated_list1(char('.'), ident), |path| {
            if path == ["yield"] {
                Expr::Yield
            } else {
                Expr::Lookup(path)
            }
        })(s)
    }

    fn expr(s: &str) -> IResult<&str, Expr<'_>> {
        alt((map(call, Expr::Call), lookup))(s)
    }

    pub fn expr_tag(s: &str) -> IResult<&str, Expr<'_>> {
        delimited(tag("{{"), ws(expr), tag("}}"))(s)
    }

    pub fn block_header(s: &str) -> IResult<&str, Call<'_>> {
        delimited(tag("{%"), ws(call), tag("%}"))(s)
    }

    pub fn end_tag(s: &str) -> IResult<&str, &str> {
        recognize(tuple((
            tag("{%"),
            multispace0,
            tag("end"),
            multispace0,
            tag("%}"),
        )))(s)
    }

}

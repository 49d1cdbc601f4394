//! Recursive-descent productions for definition files
//!
//! Every production takes the remaining token stream and returns the parsed
//! value along with the tokens that follow it.  A production that fails
//! returns a single error [`Diagnostic`]; warnings are pushed into the
//! [`Context`] and parsing carries on.
use super::{
    Diagnostic,
    lexer::{Symbol, Token, TokenKind},
};
use crate::{
    model::{
        ArcPath, Dof, Hold, HoldPoint, HoldPointKind, Joint, JointSelection,
        JointSet, MAX_DOFS, MAX_PRIORITY, PathKind, SolidKind,
    },
    units::{Scale, Units},
};
use arrayvec::ArrayVec;
use log::{debug, trace};
use nalgebra::{Point3, Vector3};
use std::str::FromStr;

/// Unconsumed input
pub(crate) type Tokens<'a> = &'a [Token];

/// Parsed value and the remaining input
pub(crate) type Parse<'a, T> = Result<(T, Tokens<'a>), Diagnostic>;

/// Words with a fixed meaning in some position
///
/// Keywords are only recognized where the grammar expects one; anywhere a
/// name is expected, a keyword's text is an ordinary name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Keyword {
    Joint,
    Constraint,
    Units,
    Arc,
    Path,
    Location,
    Rotate,
    Translate,
    Direction,
    Limits,
    Lower,
    Upper,
    Current,
    Accepted,
    Joints,
    Start,
    Except,
    Effector,
    Point,
    Weight,
    Priority,
    Vertex,
    Fixed,
    Grip,
    Sphere,
    #[strum(to_string = "INF")]
    Inf,
}

impl Keyword {
    /// Checks whether this keyword opens a top-level block
    fn starts_block(self) -> bool {
        matches!(self, Keyword::Joint | Keyword::Constraint | Keyword::Units)
    }
}

/// Kind of degree-of-freedom block
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Motion {
    Rotate,
    Translate,
}

/// State shared by the productions of one file
#[derive(Debug)]
pub(crate) struct Context {
    /// Current file units
    pub scale: Scale,
    /// Warnings, plus errors from blocks that were skipped
    pub diagnostics: Vec<Diagnostic>,
    /// Position just past the end of input
    end: (usize, usize),
}

impl Context {
    pub fn new(scale: Scale, end: (usize, usize)) -> Self {
        Self {
            scale,
            diagnostics: vec![],
            end,
        }
    }

    fn warn<S: Into<String>>(&mut self, tok: &Token, msg: S) {
        self.diagnostics
            .push(Diagnostic::warning(tok.line, tok.col, msg));
    }

    /// Builds an error for input that does not match `wanted`
    fn unexpected(&self, t: Tokens, wanted: &str) -> Diagnostic {
        match t.first() {
            Some(tok) => error_at(
                tok,
                format!("syntax error: expected {wanted}, found {}", tok.kind),
            ),
            None => Diagnostic::error(
                self.end.0,
                self.end.1,
                format!("unexpected end of file, expected {wanted}"),
            ),
        }
    }
}

fn error_at<S: Into<String>>(tok: &Token, msg: S) -> Diagnostic {
    Diagnostic::error(tok.line, tok.col, msg)
}

fn keyword(t: Tokens) -> Option<Keyword> {
    match t.first().map(|t| &t.kind) {
        Some(TokenKind::Word(w)) => Keyword::from_str(w).ok(),
        _ => None,
    }
}

fn is_symbol(t: Tokens, s: Symbol) -> bool {
    matches!(
        t.first(),
        Some(Token { kind: TokenKind::Symbol(x), .. }) if *x == s
    )
}

fn expect<'a>(
    t: Tokens<'a>,
    s: Symbol,
    ctx: &Context,
) -> Result<Tokens<'a>, Diagnostic> {
    if is_symbol(t, s) {
        Ok(&t[1..])
    } else {
        Err(ctx.unexpected(t, &format!("'{s}'")))
    }
}

/// Consumes `s` if it is next
fn skip(t: Tokens, s: Symbol) -> Tokens {
    if is_symbol(t, s) { &t[1..] } else { t }
}

/// Parses a name
pub(crate) fn ident<'a>(
    t: Tokens<'a>,
    ctx: &Context,
    what: &str,
) -> Parse<'a, String> {
    match t.first() {
        Some(Token {
            kind: TokenKind::Word(w),
            ..
        }) => Ok((w.clone(), &t[1..])),
        _ => Err(ctx.unexpected(t, what)),
    }
}

/// Parses an optionally signed number, or `INF`
pub(crate) fn number<'a>(t: Tokens<'a>, ctx: &Context) -> Parse<'a, f64> {
    let (sign, t) = if is_symbol(t, Symbol::Minus) {
        (-1.0, &t[1..])
    } else {
        (1.0, skip(t, Symbol::Plus))
    };
    let v = match t.first().map(|t| &t.kind) {
        Some(TokenKind::Number(v)) => *v,
        _ if keyword(t) == Some(Keyword::Inf) => f64::MAX,
        _ => return Err(ctx.unexpected(t, "number")),
    };
    Ok((sign * v, &t[1..]))
}

/// Parses `(x, y, z)`
pub(crate) fn vector<'a>(
    t: Tokens<'a>,
    ctx: &Context,
) -> Parse<'a, Vector3<f64>> {
    let mut t = expect(t, Symbol::OpenParen, ctx)?;
    let mut v = Vector3::zeros();
    for i in 0..3 {
        if i > 0 {
            t = expect(t, Symbol::Comma, ctx)?;
        }
        let (x, rest) = number(t, ctx)?;
        v[i] = x;
        t = rest;
    }
    let t = expect(t, Symbol::CloseParen, ctx)?;
    Ok((v, t))
}

/// Parses `= <number>;`
fn assign<'a>(t: Tokens<'a>, ctx: &Context) -> Parse<'a, f64> {
    let t = expect(t, Symbol::Equals, ctx)?;
    let (v, t) = number(t, ctx)?;
    let t = expect(t, Symbol::Semicolon, ctx)?;
    Ok((v, t))
}

/// Parses `= a/b/c;`, or `= a/b-c;` for symbolic paths
pub(crate) fn arc_path<'a>(
    t: Tokens<'a>,
    ctx: &Context,
    kind: PathKind,
) -> Parse<'a, ArcPath> {
    let t = expect(t, Symbol::Equals, ctx)?;
    let (first, mut t) = ident(t, ctx, "path segment")?;
    let mut segments = vec![first];
    loop {
        if is_symbol(t, Symbol::Semicolon) {
            t = &t[1..];
            break;
        }
        let separated = is_symbol(t, Symbol::Slash)
            || (kind == PathKind::Path && is_symbol(t, Symbol::Minus));
        if !separated {
            let wanted = match kind {
                PathKind::Arc => "'/' or ';'",
                PathKind::Path => "'/', '-' or ';'",
            };
            return Err(ctx.unexpected(t, wanted));
        }
        let (s, rest) = ident(&t[1..], ctx, "path segment")?;
        segments.push(s);
        t = rest;
    }
    let p = match kind {
        PathKind::Arc => ArcPath::arc(segments),
        PathKind::Path => ArcPath::path(segments),
    };
    Ok((p, t))
}

/// Parses `= a, b, c;`
pub(crate) fn name_list<'a>(
    t: Tokens<'a>,
    ctx: &Context,
) -> Parse<'a, Vec<String>> {
    let t = expect(t, Symbol::Equals, ctx)?;
    let (first, mut t) = ident(t, ctx, "joint name")?;
    let mut names = vec![first];
    while is_symbol(t, Symbol::Comma) {
        let (n, rest) = ident(&t[1..], ctx, "joint name")?;
        names.push(n);
        t = rest;
    }
    let t = expect(t, Symbol::Semicolon, ctx)?;
    Ok((names, t))
}

/// One step through the body of a `{ ... }` block
enum Item<'a> {
    Key(Keyword, &'a Token),
    Close(&'a Token),
}

fn item<'a>(t: Tokens<'a>, ctx: &Context, block: &str) -> Parse<'a, Item<'a>> {
    let Some(tok) = t.first() else {
        return Err(ctx.unexpected(t, "'}'"));
    };
    if is_symbol(t, Symbol::CloseBrace) {
        return Ok((Item::Close(tok), &t[1..]));
    }
    match keyword(t) {
        Some(k) => Ok((Item::Key(k, tok), &t[1..])),
        None => Err(error_at(tok, format!("{block}: unexpected {}", tok.kind))),
    }
}

/// Skips a `{ ... }` group (and a trailing `;`)
fn skip_group(t: Tokens) -> Tokens {
    let mut depth = 0usize;
    for (i, tok) in t.iter().enumerate() {
        match tok.kind {
            TokenKind::Symbol(Symbol::OpenBrace) => depth += 1,
            TokenKind::Symbol(Symbol::CloseBrace) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return skip(&t[i + 1..], Symbol::Semicolon);
                }
            }
            _ => (),
        }
    }
    &[]
}

/// Skips the remainder of a top-level block that failed to parse
///
/// `t` starts just after the block's keyword.  Stops after the block's
/// matching `}` (and a trailing `;`), after a `;` outside of any braces, or
/// before the next top-level keyword outside of any braces.
pub(crate) fn recover(t: Tokens) -> Tokens {
    let mut depth = 0usize;
    for (i, tok) in t.iter().enumerate() {
        match &tok.kind {
            TokenKind::Symbol(Symbol::OpenBrace) => depth += 1,
            TokenKind::Symbol(Symbol::CloseBrace) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return skip(&t[i + 1..], Symbol::Semicolon);
                }
            }
            TokenKind::Symbol(Symbol::Semicolon) if depth == 0 => {
                return &t[i + 1..];
            }
            TokenKind::Word(..)
                if depth == 0
                    && i > 0
                    && keyword(&t[i..]).is_some_and(Keyword::starts_block) =>
            {
                return &t[i..];
            }
            _ => (),
        }
    }
    &[]
}

/// Parses the body of a `rotate` or `translate` block
///
/// Translation values are converted into millimeters; rotations stay in
/// degrees.
pub(crate) fn dof<'a>(
    t: Tokens<'a>,
    ctx: &mut Context,
    motion: Motion,
) -> Parse<'a, Dof> {
    let mut t = expect(t, Symbol::OpenBrace, ctx)?;
    let block = motion.to_string();
    let mut direction = None;
    let (mut lower, mut upper, mut current, mut accepted) =
        (None, None, None, None);
    let close = loop {
        let (it, rest) = item(t, ctx, &block)?;
        t = rest;
        let (k, tok) = match it {
            Item::Close(tok) => break tok,
            Item::Key(k, tok) => (k, tok),
        };
        match k {
            Keyword::Direction => {
                let rest = expect(t, Symbol::Equals, ctx)?;
                let (v, rest) = vector(rest, ctx)?;
                t = expect(rest, Symbol::Semicolon, ctx)?;
                direction = Some((v, tok));
            }
            Keyword::Limits => {
                let rest = expect(t, Symbol::Equals, ctx)?;
                let (lo, rest) = number(rest, ctx)?;
                let rest = expect(rest, Symbol::Comma, ctx)?;
                let (hi, mut rest) = number(rest, ctx)?;
                if is_symbol(rest, Symbol::Comma) {
                    let (c, r) = number(&rest[1..], ctx)?;
                    current = Some(c);
                    rest = r;
                }
                lower = Some(lo);
                upper = Some(hi);
                t = skip(rest, Symbol::Semicolon);
            }
            Keyword::Lower | Keyword::Upper | Keyword::Current
            | Keyword::Accepted => {
                let (v, rest) = assign(t, ctx)?;
                t = rest;
                let slot = match k {
                    Keyword::Lower => &mut lower,
                    Keyword::Upper => &mut upper,
                    Keyword::Current => &mut current,
                    _ => &mut accepted,
                };
                *slot = Some(v);
            }
            k => {
                return Err(error_at(
                    tok,
                    format!("{block}: unexpected '{k}'"),
                ));
            }
        }
    };

    let Some((dir, dir_tok)) = direction else {
        return Err(error_at(
            close,
            format!("{block}: direction vector not given"),
        ));
    };
    let Some(mut lower) = lower else {
        return Err(error_at(close, format!("{block}: lower bound not given")));
    };
    let Some(mut upper) = upper else {
        return Err(error_at(close, format!("{block}: upper bound not given")));
    };
    if lower > upper {
        ctx.warn(close, format!("{block}: lower > upper, exchanging"));
        std::mem::swap(&mut lower, &mut upper);
    }

    let scale = ctx.scale;
    let convert = |v: f64| match motion {
        Motion::Rotate => v,
        Motion::Translate => scale.to_mm(v),
    };
    let mut d = Dof::new(dir, convert(lower), convert(upper)).ok_or_else(
        || error_at(dir_tok, format!("{block}: direction has zero length")),
    )?;
    d.current = d.clamp(current.map(convert).unwrap_or(0.0));
    d.accepted = accepted.map(|v| d.clamp(convert(v))).unwrap_or(d.current);
    trace!("{block}: [{}, {}] at {}", d.lower, d.upper, d.current);
    Ok((d, skip(t, Symbol::Semicolon)))
}

/// Parses a joint, starting just after the `joint` keyword
pub(crate) fn joint<'a>(t: Tokens<'a>, ctx: &mut Context) -> Parse<'a, Joint> {
    let (name, t) = ident(t, ctx, "joint name")?;
    let mut t = expect(t, Symbol::OpenBrace, ctx)?;
    let block = format!("joint {name}");

    let mut path: Option<ArcPath> = None;
    let mut location = None;
    let mut rotations = ArrayVec::<Dof, MAX_DOFS>::new();
    let mut translations = ArrayVec::<Dof, MAX_DOFS>::new();
    let close = loop {
        let (it, rest) = item(t, ctx, &block)?;
        t = rest;
        let (k, tok) = match it {
            Item::Close(tok) => break tok,
            Item::Key(k, tok) => (k, tok),
        };
        match k {
            Keyword::Arc | Keyword::Path => {
                let kind = if k == Keyword::Arc {
                    PathKind::Arc
                } else {
                    PathKind::Path
                };
                let (p, rest) = arc_path(t, ctx, kind)?;
                t = rest;
                if path.is_some() {
                    ctx.warn(
                        tok,
                        format!("{block}: more than one arc or path given"),
                    );
                }
                path = Some(p);
            }
            Keyword::Location => {
                let rest = expect(t, Symbol::Equals, ctx)?;
                let (v, rest) = vector(rest, ctx)?;
                t = expect(rest, Symbol::Semicolon, ctx)?;
                if location.is_some() {
                    ctx.warn(
                        tok,
                        format!("{block}: more than one location given"),
                    );
                }
                location = Some(Point3::from(v.map(|x| ctx.scale.to_mm(x))));
            }
            Keyword::Rotate | Keyword::Translate => {
                let (motion, dofs) = if k == Keyword::Rotate {
                    (Motion::Rotate, &mut rotations)
                } else {
                    (Motion::Translate, &mut translations)
                };
                if dofs.is_full() {
                    if !is_symbol(t, Symbol::OpenBrace) {
                        return Err(ctx.unexpected(t, "'{'"));
                    }
                    let msg = format!(
                        "{block}: too many {motion} blocks, discarding"
                    );
                    ctx.diagnostics.push(error_at(tok, msg));
                    t = skip_group(t);
                } else {
                    let (d, rest) = dof(t, ctx, motion)?;
                    dofs.push(d);
                    t = rest;
                }
            }
            k => {
                return Err(error_at(
                    tok,
                    format!("{block}: unexpected '{k}'"),
                ));
            }
        }
    };

    let Some(path) = path else {
        return Err(error_at(close, format!("{block}: arc not defined")));
    };
    let Some(location) = location else {
        return Err(error_at(close, format!("{block}: location not defined")));
    };
    if rotations.is_empty() && translations.is_empty() {
        return Err(error_at(
            close,
            format!("{block}: no translations or rotations defined"),
        ));
    }
    let mut j = Joint::new(name, path, location);
    j.rotations = rotations;
    j.translations = translations;
    debug!("parsed joint {} on {}", j.name, j.path);
    Ok((j, skip(t, Symbol::Semicolon)))
}

/// Parses the `{ ... }` body of a constraint's joint set
pub(crate) fn joint_set<'a>(
    t: Tokens<'a>,
    ctx: &mut Context,
) -> Parse<'a, JointSet> {
    let mut t = expect(t, Symbol::OpenBrace, ctx)?;
    let mut set = JointSet::default();
    let mut selected = false;
    loop {
        let (it, rest) = item(t, ctx, "joints")?;
        t = rest;
        let (k, tok) = match it {
            Item::Close(..) => break,
            Item::Key(k, tok) => (k, tok),
        };
        let selection = match k {
            Keyword::Start => {
                let rest = expect(t, Symbol::Equals, ctx)?;
                let (n, rest) = ident(rest, ctx, "joint name")?;
                t = expect(rest, Symbol::Semicolon, ctx)?;
                set.start = Some(n);
                continue;
            }
            Keyword::Except => {
                let (names, rest) = name_list(t, ctx)?;
                t = rest;
                set.except = names;
                continue;
            }
            Keyword::Arc => {
                let (p, rest) = arc_path(t, ctx, PathKind::Arc)?;
                t = rest;
                JointSelection::Arc(p)
            }
            Keyword::Path => {
                let (p, rest) = arc_path(t, ctx, PathKind::Path)?;
                t = rest;
                JointSelection::Arc(p)
            }
            Keyword::Joints => {
                let (names, rest) = name_list(t, ctx)?;
                t = rest;
                JointSelection::Names(names)
            }
            k => return Err(error_at(tok, format!("joints: unexpected '{k}'"))),
        };
        if selected {
            ctx.warn(tok, "joints: more than one arc, path or list given");
        }
        selected = true;
        set.selection = selection;
    }
    Ok((set, skip(t, Symbol::Semicolon)))
}

/// Parses a hold point, starting just after `effector =` or `point =`
pub(crate) fn point<'a>(
    t: Tokens<'a>,
    ctx: &mut Context,
) -> Parse<'a, HoldPoint> {
    let Some(tok) = t.first() else {
        return Err(ctx.unexpected(t, "point type"));
    };
    let solid = match keyword(t) {
        Some(Keyword::Fixed) => {
            let (v, rest) = vector(&t[1..], ctx)?;
            let rest = expect(rest, Symbol::Semicolon, ctx)?;
            let p = Point3::from(v.map(|x| ctx.scale.to_mm(x)));
            return Ok((HoldPoint::fixed(p), rest));
        }
        Some(Keyword::Grip) => Some(SolidKind::Grip),
        Some(Keyword::Sphere) => Some(SolidKind::Sphere),
        Some(Keyword::Joint) => None,
        _ => {
            return Err(ctx.unexpected(
                t,
                "'fixed', 'grip', 'sphere' or 'joint'",
            ));
        }
    };

    let mut t = expect(&t[1..], Symbol::OpenBrace, ctx)?;
    let mut path: Option<ArcPath> = None;
    let mut vertex = None;
    let close = loop {
        let (it, rest) = item(t, ctx, "point")?;
        t = rest;
        let (k, tok) = match it {
            Item::Close(tok) => break tok,
            Item::Key(k, tok) => (k, tok),
        };
        match k {
            Keyword::Arc | Keyword::Path => {
                let kind = if k == Keyword::Arc {
                    PathKind::Arc
                } else {
                    PathKind::Path
                };
                let (p, rest) = arc_path(t, ctx, kind)?;
                t = rest;
                if path.is_some() {
                    ctx.warn(tok, "point: more than one arc or path given");
                }
                path = Some(p);
            }
            Keyword::Vertex => {
                let (v, rest) = assign(t, ctx)?;
                t = rest;
                if v < 0.0 || v.fract() != 0.0 || v > f64::from(u32::MAX) {
                    return Err(error_at(
                        tok,
                        "point: vertex must be a non-negative integer",
                    ));
                }
                vertex = Some(v as u32);
            }
            k => return Err(error_at(tok, format!("point: unexpected '{k}'"))),
        }
    };
    let Some(path) = path else {
        return Err(error_at(close, "point: path/arc missing"));
    };
    let kind = match solid {
        Some(solid) => HoldPointKind::Solid {
            path,
            solid,
            vertex,
        },
        None => {
            if vertex.is_some() {
                ctx.warn(tok, "point: vertex is ignored for joints");
            }
            HoldPointKind::Joint { path }
        }
    };
    Ok((kind.into(), skip(t, Symbol::Semicolon)))
}

/// Parses a constraint, starting just after the `constraint` keyword
pub(crate) fn hold<'a>(t: Tokens<'a>, ctx: &mut Context) -> Parse<'a, Hold> {
    let (name, t) = match t.first() {
        Some(Token {
            kind: TokenKind::Word(w),
            ..
        }) => (Some(w.clone()), &t[1..]),
        _ => (None, t),
    };
    let block = match &name {
        Some(n) => format!("constraint {n}"),
        None => "constraint".to_owned(),
    };
    let mut t = expect(t, Symbol::OpenBrace, ctx)?;

    let mut joints = None;
    let mut effector = None;
    let mut objective = None;
    let mut weight = None;
    let mut priority = None;
    let close = loop {
        let (it, rest) = item(t, ctx, &block)?;
        t = rest;
        let (k, tok) = match it {
            Item::Close(tok) => break tok,
            Item::Key(k, tok) => (k, tok),
        };
        match k {
            Keyword::Joints => {
                if joints.is_some() {
                    return Err(error_at(
                        tok,
                        format!("{block}: joint set redefined"),
                    ));
                }
                let (s, rest) = joint_set(t, ctx)?;
                joints = Some(s);
                t = rest;
            }
            Keyword::Effector | Keyword::Point => {
                let rest = expect(t, Symbol::Equals, ctx)?;
                let (p, rest) = point(rest, ctx)?;
                t = rest;
                let slot = if k == Keyword::Effector {
                    &mut effector
                } else {
                    &mut objective
                };
                if slot.is_some() {
                    ctx.warn(tok, format!("{block}: more than one {k} given"));
                }
                *slot = Some(p);
            }
            Keyword::Weight => {
                let (w, rest) = assign(t, ctx)?;
                t = rest;
                if w < 0.0 {
                    return Err(error_at(
                        tok,
                        format!("{block}: weight must not be negative"),
                    ));
                }
                weight = Some(w);
            }
            Keyword::Priority => {
                let (p, rest) = assign(t, ctx)?;
                t = rest;
                let range = 0.0..=f64::from(MAX_PRIORITY);
                if p.fract() != 0.0 || !range.contains(&p) {
                    return Err(error_at(
                        tok,
                        format!(
                            "{block}: priority must be an integer in \
                             0..={MAX_PRIORITY}"
                        ),
                    ));
                }
                priority = Some(p as u32);
            }
            k => {
                return Err(error_at(
                    tok,
                    format!("{block}: unexpected '{k}'"),
                ));
            }
        }
    };

    let Some(joints) = joints else {
        return Err(error_at(close, format!("{block}: no joint set given")));
    };
    let Some(effector) = effector else {
        return Err(error_at(close, format!("{block}: no effector given")));
    };
    let Some(objective) = objective else {
        return Err(error_at(close, format!("{block}: no goal given")));
    };
    let mut h = Hold::new(effector, objective, joints);
    h.name = name;
    if let Some(w) = weight {
        h.weight = w;
    }
    if let Some(p) = priority {
        h.priority = p;
    }
    debug!("parsed {block} at priority {}", h.priority);
    Ok((h, skip(t, Symbol::Semicolon)))
}

/// Parses a units statement, starting just after the `units` keyword
///
/// Accepts a unit name or a number of millimeters per unit, optionally
/// followed by `mm`.
pub(crate) fn units<'a>(t: Tokens<'a>, ctx: &Context) -> Parse<'a, Scale> {
    let Some(tok) = t.first() else {
        return Err(ctx.unexpected(t, "unit"));
    };
    let (scale, t) = match &tok.kind {
        TokenKind::Word(w) => {
            let u = Units::from_str(w).map_err(|_| {
                error_at(tok, format!("units: unknown unit '{w}'"))
            })?;
            (Scale::from(u), &t[1..])
        }
        TokenKind::Number(v) => {
            let s = Scale::from_mm(*v).ok_or_else(|| {
                error_at(tok, "units: millimeters per unit must be positive")
            })?;
            let rest = &t[1..];
            let rest = match rest.first().map(|t| &t.kind) {
                Some(TokenKind::Word(w)) if w == "mm" => &rest[1..],
                _ => rest,
            };
            (s, rest)
        }
        TokenKind::Symbol(..) => return Err(ctx.unexpected(t, "unit")),
    };
    Ok((scale, skip(t, Symbol::Semicolon)))
}

/// Parses every top-level block in a file
///
/// Blocks that fail are reported and skipped.  A run of tokens that cannot
/// start a block is reported once and skipped up to the next block.
pub(crate) fn file(
    mut t: Tokens,
    ctx: &mut Context,
) -> (Vec<Joint>, Vec<Hold>) {
    let mut joints = vec![];
    let mut holds = vec![];
    while let Some(tok) = t.first() {
        let rest = &t[1..];
        let r = match keyword(t) {
            Some(Keyword::Joint) => joint(rest, ctx).map(|(j, rest)| {
                joints.push(j);
                rest
            }),
            Some(Keyword::Constraint) => hold(rest, ctx).map(|(h, rest)| {
                holds.push(h);
                rest
            }),
            Some(Keyword::Units) => match units(rest, ctx) {
                Ok((s, rest)) => {
                    trace!("units: {} mm", s.mm_per_unit());
                    ctx.scale = s;
                    Ok(rest)
                }
                Err(e) => Err(e),
            },
            _ => {
                ctx.diagnostics.push(error_at(
                    tok,
                    format!("syntax error: unexpected {}", tok.kind),
                ));
                t = rest;
                while !t.is_empty()
                    && !keyword(t).is_some_and(Keyword::starts_block)
                {
                    t = &t[1..];
                }
                continue;
            }
        };
        t = match r {
            Ok(rest) => rest,
            Err(d) => {
                debug!("skipping block at line {}: {}", tok.line, d.message);
                ctx.diagnostics.push(d);
                recover(rest)
            }
        };
    }
    (joints, holds)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::{Severity, lexer::tokenize};
    use approx::assert_relative_eq;

    fn parse_with<T, F>(
        s: &str,
        scale: Scale,
        f: F,
    ) -> Result<(T, Context), Diagnostic>
    where
        F: for<'a> Fn(Tokens<'a>, &mut Context) -> Parse<'a, T>,
    {
        let (tokens, errs, end) = tokenize(s);
        assert!(errs.is_empty(), "{errs:?}");
        let mut ctx = Context::new(scale, end);
        let (v, rest) = f(&tokens, &mut ctx)?;
        assert!(rest.is_empty(), "unconsumed: {rest:?}");
        Ok((v, ctx))
    }

    fn parse<T, F>(s: &str, f: F) -> Result<(T, Context), Diagnostic>
    where
        F: for<'a> Fn(Tokens<'a>, &mut Context) -> Parse<'a, T>,
    {
        parse_with(s, Scale::default(), f)
    }

    #[test]
    fn numbers_and_vectors() {
        let (v, _) = parse("-INF", |t, c| number(t, c)).unwrap();
        assert_eq!(v, -f64::MAX);
        let (v, _) = parse("+2.5", |t, c| number(t, c)).unwrap();
        assert_eq!(v, 2.5);
        let (v, _) = parse("(1, -2, 3e1)", |t, c| vector(t, c)).unwrap();
        assert_eq!(v, Vector3::new(1.0, -2.0, 30.0));

        let e = parse("(1, 2)", |t, c| vector(t, c)).unwrap_err();
        assert_eq!((e.line, e.col), (1, 6));
        assert_eq!(e.message, "syntax error: expected ',', found ')'");
        let e = parse("(1, 2,", |t, c| vector(t, c)).unwrap_err();
        assert_eq!(e.message, "unexpected end of file, expected number");
    }

    #[test]
    fn paths() {
        let (p, _) = parse("= base/arm1-arm2;", |t, c| {
            arc_path(t, c, PathKind::Path)
        })
        .unwrap();
        assert_eq!(p, ArcPath::path(["base", "arm1", "arm2"]));

        let (p, _) = parse("= a/joint/c;", |t, c| {
            arc_path(t, c, PathKind::Arc)
        })
        .unwrap();
        assert_eq!(p, ArcPath::arc(["a", "joint", "c"]));

        let e = parse("= a-b;", |t, c| arc_path(t, c, PathKind::Arc))
            .unwrap_err();
        assert_eq!(e.message, "syntax error: expected '/' or ';', found '-'");

        let (n, _) = parse("= j1, j2 ,j3;", |t, c| name_list(t, c)).unwrap();
        assert_eq!(n, vec!["j1", "j2", "j3"]);
    }

    #[test]
    fn translation_limits() {
        let (d, ctx) = parse_with(
            "{ direction = (0, 0, 2); limits = 5, -5, 7; }",
            Scale::from(Units::Inches),
            |t, c| dof(t, c, Motion::Translate),
        )
        .unwrap();
        assert_eq!(d.direction.into_inner(), Vector3::z());
        assert_relative_eq!(d.lower, -127.0);
        assert_relative_eq!(d.upper, 127.0);
        assert_relative_eq!(d.current, 127.0);
        assert_relative_eq!(d.accepted, 127.0);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].severity, Severity::Warning);
        assert_eq!(
            ctx.diagnostics[0].message,
            "translate: lower > upper, exchanging"
        );
    }

    #[test]
    fn rotation_keys() {
        let (d, ctx) = parse(
            "{ direction=(1,0,0); lower=-INF; upper = 45; current=10; \
             accepted = 90; };",
            |t, c| dof(t, c, Motion::Rotate),
        )
        .unwrap();
        assert_eq!(d.lower, -f64::MAX);
        assert_eq!(d.upper, 45.0);
        assert_eq!(d.current, 10.0);
        assert_eq!(d.accepted, 45.0);
        assert!(ctx.diagnostics.is_empty());

        let (d, _) = parse(
            "{ direction=(1,0,0); limits = -10, 10; }",
            |t, c| dof(t, c, Motion::Rotate),
        )
        .unwrap();
        assert_eq!((d.current, d.accepted), (0.0, 0.0));
    }

    #[test]
    fn incomplete_dofs() {
        let e = parse("{ limits = -1, 1, 0; }", |t, c| {
            dof(t, c, Motion::Rotate)
        })
        .unwrap_err();
        assert_eq!(e.message, "rotate: direction vector not given");
        assert_eq!((e.line, e.col), (1, 22));

        let e = parse("{ direction = (1,0,0); lower = 1; }", |t, c| {
            dof(t, c, Motion::Rotate)
        })
        .unwrap_err();
        assert_eq!(e.message, "rotate: upper bound not given");

        let e = parse("{ direction = (0,0,0); limits = 0, 1; }", |t, c| {
            dof(t, c, Motion::Translate)
        })
        .unwrap_err();
        assert_eq!(e.message, "translate: direction has zero length");

        let e = parse("{ location = (0,0,0); }", |t, c| {
            dof(t, c, Motion::Translate)
        })
        .unwrap_err();
        assert_eq!(e.message, "translate: unexpected 'location'");
    }

    #[test]
    fn joints() {
        let src = "J1 {
            path = base-arm1;
            location = (1, 2, 3);
            rotate { direction = (0, 0, 1); limits = -90, 90, 0; }
            translate { direction = (1, 0, 0); limits = 0, 2, 1; }
        };";
        let (j, ctx) =
            parse_with(src, Scale::from(Units::Centimeters), |t, c| joint(t, c))
                .unwrap();
        assert_eq!(j.name, "J1");
        assert_eq!(j.path, ArcPath::path(["base", "arm1"]));
        assert_eq!(j.location, Point3::new(10.0, 20.0, 30.0));
        assert_eq!(j.rotations.len(), 1);
        assert_eq!(j.rotations[0].upper, 90.0);
        assert_eq!(j.translations[0].upper, 20.0);
        assert_eq!(j.translations[0].current, 10.0);
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn too_many_translations() {
        let t = "translate { direction = (1, 0, 0); limits = -1, 1, 0; }";
        let src =
            format!("J {{ arc = a/b; location = (0,0,0); {t} {t} {t} {t} }}");
        let (j, ctx) = parse(&src, |t, c| joint(t, c)).unwrap();
        assert_eq!(j.translations.len(), 3);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.diagnostics[0].is_error());
        assert_eq!(
            ctx.diagnostics[0].message,
            "joint J: too many translate blocks, discarding"
        );
    }

    #[test]
    fn joint_requirements() {
        let e = parse(
            "J { location = (0,0,0); \
             rotate { direction=(0,0,1); limits=-1,1; } }",
            |t, c| joint(t, c),
        )
        .unwrap_err();
        assert_eq!(e.message, "joint J: arc not defined");
        let e = parse("J { arc = a/b; location = (0,0,0); }", |t, c| {
            joint(t, c)
        })
        .unwrap_err();
        assert_eq!(e.message, "joint J: no translations or rotations defined");

        let (_, ctx) = parse(
            "J { arc = a/b; arc = a/c; location = (0,0,0); \
             rotate { direction=(0,0,1); limits=-1,1; } }",
            |t, c| joint(t, c),
        )
        .unwrap();
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn holds() {
        let src = "reach {
            joints { start = J1; joints = J1, J2; except = J3; }
            effector = fixed (1, 2, 3);
            point = grip { arc = base/arm1/tip; vertex = 2; };
            weight = 2;
            priority = 10;
        }";
        let (h, ctx) =
            parse_with(src, Scale::from(Units::Centimeters), |t, c| hold(t, c))
                .unwrap();
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(h.name.as_deref(), Some("reach"));
        assert_eq!(h.weight, 2.0);
        assert_eq!(h.priority, 10);
        assert_eq!(h.joints.start.as_deref(), Some("J1"));
        assert_eq!(
            h.joints.selection,
            JointSelection::Names(vec!["J1".to_owned(), "J2".to_owned()])
        );
        assert_eq!(h.joints.except, vec!["J3"]);
        assert_eq!(
            h.effector.kind,
            HoldPointKind::Fixed(Point3::new(10.0, 20.0, 30.0))
        );
        assert_eq!(
            h.objective.kind,
            HoldPointKind::Solid {
                path: ArcPath::arc(["base", "arm1", "tip"]),
                solid: SolidKind::Grip,
                vertex: Some(2),
            }
        );
    }

    #[test]
    fn hold_defaults() {
        let src = "{ joints { } effector = joint { path = base/arm1-J2; } \
                   point = sphere { arc = b/s; } }";
        let (h, _) = parse(src, |t, c| hold(t, c)).unwrap();
        assert_eq!(h.name, None);
        assert_eq!(h.weight, 1.0);
        assert_eq!(h.priority, 50);
        assert_eq!(h.joints, JointSet::default());
        assert_eq!(
            h.effector.kind,
            HoldPointKind::Joint {
                path: ArcPath::path(["base", "arm1", "J2"])
            }
        );
    }

    #[test]
    fn hold_errors() {
        let body =
            "joints { } effector = fixed (0,0,0); point = fixed (1,0,0);";
        let bad_priority = "constraint: priority must be an integer in 0..=100";
        for (extra, msg) in [
            ("priority = 2.5;", bad_priority),
            ("priority = 101;", bad_priority),
            ("weight = -1;", "constraint: weight must not be negative"),
            ("joints { }", "constraint: joint set redefined"),
        ] {
            let src = format!("{{ {body} {extra} }}");
            let e = parse(&src, |t, c| hold(t, c)).unwrap_err();
            assert_eq!(e.message, msg);
        }
        let e = parse("{ joints { } effector = fixed (0,0,0); }", |t, c| {
            hold(t, c)
        })
        .unwrap_err();
        assert_eq!(e.message, "constraint: no goal given");
        let e = parse(
            "{ joints { } effector = fixed (0,0,0); point = box {} }",
            |t, c| hold(t, c),
        )
        .unwrap_err();
        assert_eq!(
            e.message,
            "syntax error: expected 'fixed', 'grip', 'sphere' or 'joint', \
             found 'box'"
        );
    }

    #[test]
    fn unit_statements() {
        let (s, _) = parse("in;", |t, c| units(t, c)).unwrap();
        assert_eq!(s.mm_per_unit(), 25.4);
        let (s, _) = parse("304.8mm;", |t, c| units(t, c)).unwrap();
        assert_eq!(s.mm_per_unit(), 304.8);
        let (s, _) = parse("2", |t, c| units(t, c)).unwrap();
        assert_eq!(s.mm_per_unit(), 2.0);
        let e = parse("furlongs;", |t, c| units(t, c)).unwrap_err();
        assert_eq!(e.message, "units: unknown unit 'furlongs'");
    }

    #[test]
    fn recovery() {
        let (tokens, _, _) =
            tokenize("A { x { } y; } ; joint B");
        let rest = recover(&tokens);
        assert_eq!(rest.len(), 2);

        let (tokens, _, _) = tokenize("furlongs ; joint B");
        assert_eq!(recover(&tokens).len(), 2);

        let (tokens, _, _) = tokenize("A location constraint C { }");
        assert_eq!(recover(&tokens).len(), 4);
    }
}

//! The built-in library installed into every compile.
//!
//! Built-ins carry the NOT_AVAILABLE position sentinel and live in the
//! `<built-in>` file, so tree traversals never descend into them. Their
//! result types are pre-resolved, which is what lets member completion
//! offer `forAll` after `(1..10).`.

use crate::ast::{AstBuilder, Contract, Decl, DeclId, ExprKind, SourcePos};

pub struct Builtins {
    pub universe: DeclId,
}

fn blank(name: &str, outer: Option<DeclId>, is_arg: bool) -> Decl {
    Decl {
        name: name.to_string(),
        pos: SourcePos::NOT_AVAILABLE,
        args: Vec::new(),
        result_type: None,
        contract: Contract::default(),
        body: None,
        inner: Vec::new(),
        parent: None,
        outer,
        is_arg,
    }
}

struct Installer<'a> {
    b: &'a mut AstBuilder,
}

impl Installer<'_> {
    fn decl(&mut self, outer: DeclId, name: &str) -> DeclId {
        let id = self.b.add_decl(blank(name, Some(outer), false));
        self.b.decl_mut(outer).inner.push(id);
        id
    }

    fn routine(
        &mut self,
        outer: DeclId,
        name: &str,
        arg_names: &[&str],
        result: Option<DeclId>,
    ) -> DeclId {
        let id = self.decl(outer, name);
        let args: Vec<DeclId> = arg_names
            .iter()
            .map(|a| self.b.add_decl(blank(a, Some(id), true)))
            .collect();
        self.b.decl_mut(id).args = args;
        if let Some(ty) = result {
            let name = self.b.decl(ty).name.clone();
            let rt = self.b.add_expr(
                ExprKind::TypeRef {
                    name,
                    resolved: Some(ty),
                },
                SourcePos::NOT_AVAILABLE,
            );
            self.b.decl_mut(id).result_type = Some(rt);
        }
        id
    }
}

pub fn install(b: &mut AstBuilder) -> Builtins {
    let universe = b.add_decl(blank("universe", None, false));
    let mut ins = Installer { b };

    // Type shells first, so members can reference them as result types.
    let unit = ins.decl(universe, "unit");
    let i32t = ins.decl(universe, "i32");
    let u32t = ins.decl(universe, "u32");
    let f64t = ins.decl(universe, "f64");
    let boolean = ins.decl(universe, "bool");
    let string = ins.decl(universe, "String");
    let interval = ins.decl(universe, "interval");

    ins.routine(universe, "say", &["msg"], Some(unit));
    ins.routine(universe, "yak", &["msg"], Some(unit));
    ins.routine(universe, "panic", &["msg"], Some(unit));

    for num in [i32t, u32t, f64t] {
        for op in ["infix +", "infix -", "infix *", "infix /", "infix %"] {
            ins.routine(num, op, &["other"], Some(num));
        }
        for op in ["infix <", "infix >", "infix <=", "infix >=", "infix =", "infix !="] {
            ins.routine(num, op, &["other"], Some(boolean));
        }
        ins.routine(num, "infix ..", &["other"], Some(interval));
        ins.routine(num, "asString", &[], Some(string));
    }

    for op in ["infix &&", "infix ||", "infix ="] {
        ins.routine(boolean, op, &["other"], Some(boolean));
    }

    ins.routine(string, "length", &[], Some(i32t));
    ins.routine(string, "infix +", &["other"], Some(string));

    ins.routine(interval, "forAll", &["f"], Some(unit));
    ins.routine(interval, "contains", &["n"], Some(boolean));
    ins.routine(interval, "size", &[], Some(i32t));
    ins.routine(interval, "lower", &[], Some(i32t));
    ins.routine(interval, "upper", &[], Some(i32t));
    ins.routine(interval, "asString", &[], Some(string));

    Builtins { universe }
}

//! Synthetic instruction streams shared by the unit tests.

use df_instr::{Instr, InstrKind, MethodBody, MethodSig};
use std::collections::BTreeMap;

/// Builds a method body from `(index, opcode, kind, successors)` rows,
/// deriving the predecessor sets from the successor sets.
pub(crate) fn stream(sig: &str, rows: &[(u32, &str, InstrKind, &[u32])]) -> MethodBody {
    let mut preds: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (index, _, _, succs) in rows {
        for s in *succs {
            preds.entry(*s).or_default().push(*index);
        }
    }
    let instrs = rows
        .iter()
        .map(|(index, opcode, kind, succs)| {
            let mut instr = Instr::new(*index, opcode, *kind);
            if *kind == InstrKind::Invoke {
                let target: MethodSig = opcode
                    .split_once(' ')
                    .map(|(_, t)| t)
                    .unwrap_or("java.lang.Object->toString()Ljava.lang.String;")
                    .parse()
                    .unwrap();
                instr = instr.with_target(target);
            }
            instr.with_flow(
                preds.get(index).cloned().unwrap_or_default(),
                succs.iter().copied(),
            )
        })
        .collect();
    MethodBody::new(sig.parse().unwrap(), instrs)
}

/// The 17-instruction regression stream: two nested branches in the first
/// arm of the outer conditional, one loop in the other, then a linear tail.
/// At instruction level this yields a 19-vertex CFG.
pub(crate) fn nested_branch_loop() -> MethodBody {
    use InstrKind::{Goto, If, Plain, Return};
    stream(
        "com.example.Fixture->run()V",
        &[
            (0, "const/4", Plain, &[1]),
            (1, "if-eqz", If, &[2, 9]),
            (2, "const/4", Plain, &[3]),
            (3, "if-ltz", If, &[4, 6]),
            (4, "add-int", Plain, &[5]),
            (5, "goto", Goto, &[8]),
            (6, "sub-int", Plain, &[7]),
            (7, "goto", Goto, &[8]),
            (8, "goto", Goto, &[13]),
            (9, "const/16", Plain, &[10]),
            (10, "if-gez", If, &[11, 13]),
            (11, "add-int/lit8", Plain, &[12]),
            (12, "goto", Goto, &[10]),
            (13, "move", Plain, &[14]),
            (14, "move", Plain, &[15]),
            (15, "move", Plain, &[16]),
            (16, "return-void", Return, &[]),
        ],
    )
}

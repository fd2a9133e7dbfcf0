//! End-to-end pipeline tests.
//!
//! A front-end style program (stack slots for locals, a helper function, a
//! library call) goes through the standard pipeline with verification after
//! every pass.

use midend::{
    compiler::{EventKind, PassManager, PipelineConfig},
    ir::{verify_module, verify_uses, BlockId, Builder, CmpPredicate, FuncId, Module, Opcode},
    Error, Result,
};

struct Program {
    module: Module,
    main: FuncId,
    entry: BlockId,
    header: BlockId,
    body: BlockId,
}

/// ```text
/// declare void print(i32)
/// i32 unused = 0
/// i32 square(i32 x) { return x * x; }
/// i32 helper() { return 0; }
/// i32 main(i32 n) {
///     i32 acc = 0;
///     for (i32 i = 0; i < n; i = i + 1) acc = acc + square(n);
///     print(acc);
///     return acc;
/// }
/// ```
fn build_program() -> Result<Program> {
    let mut module = Module::new();
    let i32_ty = module.int32_type();
    let void = module.void_type();
    let zero = module.const_int(0);
    let one = module.const_int(1);
    module.add_global("unused", i32_ty, false, Some(zero))?;

    let print_ty = module.function_type(void, vec![i32_ty]);
    let print = module.add_function("print", print_ty)?;
    let unary = module.function_type(i32_ty, vec![i32_ty]);
    let square = module.add_function("square", unary)?;
    let nullary = module.function_type(i32_ty, vec![]);
    let helper = module.add_function("helper", nullary)?;
    let main = module.add_function("main", unary)?;

    let x = module.function_arg(square, 0).expect("argument");
    let n = module.function_arg(main, 0).expect("argument");
    let square_entry = module.add_block(square, "entry");
    let helper_entry = module.add_block(helper, "entry");
    let entry = module.add_block(main, "entry");
    let header = module.add_block(main, "header");
    let body = module.add_block(main, "body");
    let exit = module.add_block(main, "exit");

    let mut b = Builder::at_end(&mut module, square_entry);
    let product = b.mul(x, x)?;
    b.ret(Some(product.into()))?;

    b.position_at_end(helper_entry);
    b.ret(Some(zero.into()))?;

    b.position_at_end(entry);
    let acc = b.alloca(i32_ty)?;
    let i = b.alloca(i32_ty)?;
    b.store(zero, acc)?;
    b.store(zero, i)?;
    b.br(header)?;

    b.position_at_end(header);
    let current = b.load(i)?;
    let cond = b.icmp(CmpPredicate::Lt, current, n)?;
    b.cond_br(cond, body, exit)?;

    b.position_at_end(body);
    let sq = b.call(square, &[n.into()])?;
    let old = b.load(acc)?;
    let sum = b.add(old, sq)?;
    b.store(sum, acc)?;
    let counter = b.load(i)?;
    let next = b.add(counter, one)?;
    b.store(next, i)?;
    b.br(header)?;

    b.position_at_end(exit);
    let result = b.load(acc)?;
    b.call(print, &[result.into()])?;
    b.ret(Some(result.into()))?;

    Ok(Program {
        module,
        main,
        entry,
        header,
        body,
    })
}

fn opcodes(module: &Module, block: BlockId) -> Vec<Opcode> {
    module
        .block(block)
        .instructions()
        .iter()
        .map(|i| module.inst(*i).opcode())
        .collect()
}

#[test]
fn test_standard_pipeline() -> Result<()> {
    let Program {
        mut module,
        main,
        entry,
        header,
        body,
    } = build_program()?;
    verify_module(&module)?;

    let mut manager = PassManager::standard(&PipelineConfig::checked());
    assert!(manager.run(&mut module)?);
    verify_module(&module)?;
    verify_uses(&module)?;

    // Locals live in registers, the pure call sits in front of the loop.
    assert!(module.function_instructions(main).into_iter().all(|i| !matches!(
        module.inst(i).opcode(),
        Opcode::Alloca | Opcode::Load | Opcode::Store
    )));
    assert_eq!(opcodes(&module, entry), [Opcode::Call, Opcode::Br]);
    assert_eq!(opcodes(&module, header)[..2], [Opcode::Phi, Opcode::Phi]);
    assert!(!opcodes(&module, body).contains(&Opcode::Call));

    // Unreferenced symbols are gone, the entry point and library stay.
    assert!(module.function_by_name("helper").is_none());
    assert!(module.global_by_name("unused").is_none());
    assert!(module.function_by_name("square").is_some());
    assert!(module.function_by_name("print").is_some());

    let stats = manager.stats();
    assert_eq!(stats.passes_run, 6);
    assert_eq!(stats.slots_promoted, 2);
    assert_eq!(stats.phis_inserted, 2);
    assert_eq!(stats.instructions_hoisted, 1);
    assert_eq!(stats.preheaders_created, 0);
    assert_eq!(stats.functions_removed, 1);
    assert_eq!(stats.globals_removed, 1);
    assert_eq!(stats.warnings, 0);
    assert!(manager
        .events()
        .filter_kind(EventKind::PureFunctionIdentified)
        .any(|e| e.function.as_deref() == Some("square")));
    Ok(())
}

#[test]
fn test_pipeline_reaches_fixpoint() -> Result<()> {
    let Program { mut module, .. } = build_program()?;
    PassManager::standard(&PipelineConfig::checked()).run(&mut module)?;

    let mut again = PassManager::standard(&PipelineConfig::checked());
    assert!(!again.run(&mut module)?);
    assert_eq!(again.events().transformation_count(), 0);
    Ok(())
}

#[test]
fn test_minimal_pipeline_keeps_loop_body() -> Result<()> {
    let Program {
        mut module, body, ..
    } = build_program()?;
    let mut manager = PassManager::standard(&PipelineConfig::minimal());
    assert_eq!(manager.pass_names(), ["dominators", "loops", "mem2reg", "dce"]);
    manager.run(&mut module)?;

    assert!(opcodes(&module, body).contains(&Opcode::Call));
    assert_eq!(manager.stats().instructions_hoisted, 0);
    Ok(())
}

#[test]
fn test_pipeline_rejects_unreachable_blocks() -> Result<()> {
    let Program {
        mut module, main, ..
    } = build_program()?;
    let zero = module.const_int(0);
    let orphan = module.add_block(main, "orphan");
    Builder::at_end(&mut module, orphan).ret(Some(zero.into()))?;

    let mut manager = PassManager::standard(&PipelineConfig::checked());
    match manager.run(&mut module) {
        Err(Error::PassFailed { pass, .. }) => assert_eq!(pass, "mem2reg"),
        other => panic!("expected mem2reg to fail, got {:?}", other),
    }
    assert!(manager.events().has(EventKind::PassStarted));
    Ok(())
}

//! Lowers a `SpellSource` into a flat `Step` graph with `dependsOn` edges.
//!
//! Consecutive `let`/bare-expression statements are batched into a single
//! `compute` step (so a run of pure arithmetic doesn't pay one scheduler
//! dispatch per line); any other statement flushes the pending batch first.
//! Step ids are `<kind>_<counter>`, stable for a given source because the
//! counters are assigned in a single left-to-right walk.

use std::collections::{HashMap, HashSet};

use crate::transformer::{SpellSource, TriggerSpec};
use crate::types::{Result, SpellId};

use super::model::*;
use crate::parser::ast::{Expr, JoinPolicy as AstJoinPolicy, OnFailure as AstOnFailure};
use crate::parser::ast::{PipelineStage as AstPipelineStage, SortDir as AstSortDir};
use crate::parser::ast::{Stmt, StmtKind};

pub fn generate(source: SpellSource) -> Result<SpellIr> {
    let mut gen = Generator::default();
    let mut triggers = Vec::new();
    for entry in &source.triggers {
        let mut bindings: HashMap<String, String> = HashMap::new();
        let top_level = gen.lower_block(&entry.body, &mut bindings)?;
        triggers.push(TriggerEntry {
            trigger: entry.trigger.clone(),
            top_level,
        });
    }
    Ok(SpellIr {
        spell_id: SpellId::new(),
        name: source.name,
        params: source.params,
        state_persistent: source.state_persistent,
        state_ephemeral: source.state_ephemeral,
        guards: source.guards,
        aliases: source.aliases,
        venues: source.venues,
        triggers,
        steps: gen.steps,
    })
}

#[derive(Default)]
struct Generator {
    steps: Vec<Step>,
    counters: HashMap<&'static str, u32>,
}

impl Generator {
    fn next_id(&mut self, kind: &'static str) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{kind}_{counter}")
    }

    /// Lowers a statement block, returning the ids of the steps created at
    /// this nesting level (in execution order). `bindings` maps a bound
    /// name to the step id that produced it, threaded by mutable reference
    /// so nested blocks see names bound before them.
    fn lower_block(
        &mut self,
        stmts: &[Stmt],
        bindings: &mut HashMap<String, String>,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut pending: Vec<(Option<String>, Expression)> = Vec::new();

        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Let { name, value } => {
                    pending.push((Some(name.clone()), value.clone()));
                }
                StmtKind::Compute(expr) => {
                    pending.push((None, expr.clone()));
                }
                _ => {
                    self.flush_pending(&mut pending, &mut ids, bindings);
                    let id = self.lower_stmt(stmt, bindings)?;
                    ids.push(id);
                }
            }
        }
        self.flush_pending(&mut pending, &mut ids, bindings);
        Ok(ids)
    }

    fn flush_pending(
        &mut self,
        pending: &mut Vec<(Option<String>, Expression)>,
        ids: &mut Vec<String>,
        bindings: &mut HashMap<String, String>,
    ) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        let id = self.next_id("compute");
        let mut depends_on = HashSet::new();
        for (_, expr) in &batch {
            collect_deps(expr, bindings, &mut depends_on);
        }
        for (name, _) in &batch {
            if let Some(name) = name {
                bindings.insert(name.clone(), id.clone());
            }
        }
        self.steps.push(Step {
            id: id.clone(),
            kind: StepKind::Compute { bindings: batch },
            depends_on: depends_on.into_iter().collect(),
        });
        ids.push(id);
    }

    fn lower_stmt(&mut self, stmt: &Stmt, bindings: &mut HashMap<String, String>) -> Result<String> {
        match &stmt.kind {
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut deps = HashSet::new();
                collect_deps(cond, bindings, &mut deps);
                let then_steps = self.lower_block(then_body, &mut bindings.clone())?;
                let else_steps = self.lower_block(else_body, &mut bindings.clone())?;
                let id = self.next_id("conditional");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Conditional {
                        cond: cond.clone(),
                        then_steps,
                        else_steps,
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::For { var, iter, body } => {
                let mut deps = HashSet::new();
                collect_deps(iter, bindings, &mut deps);
                let mut body_bindings = bindings.clone();
                body_bindings.remove(var);
                let body_steps = self.lower_block(body, &mut body_bindings)?;
                let id = self.next_id("loop");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Loop {
                        loop_type: LoopType::For {
                            var: var.clone(),
                            iter: iter.clone(),
                        },
                        body_steps,
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Repeat { count, body } => {
                let mut deps = HashSet::new();
                collect_deps(count, bindings, &mut deps);
                let body_steps = self.lower_block(body, &mut bindings.clone())?;
                let id = self.next_id("loop");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Loop {
                        loop_type: LoopType::Repeat {
                            count: count.clone(),
                        },
                        body_steps,
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Until { cond, body } => {
                let mut deps = HashSet::new();
                collect_deps(cond, bindings, &mut deps);
                let body_steps = self.lower_block(body, &mut bindings.clone())?;
                let id = self.next_id("loop");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Loop {
                        loop_type: LoopType::Until { cond: cond.clone() },
                        body_steps,
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Parallel { join, branches } => {
                let mut deps = HashSet::new();
                let mut branch_ids = Vec::new();
                for branch in branches {
                    branch_ids.push(self.lower_block(branch, &mut bindings.clone())?);
                }
                let join_ir = match join {
                    AstJoinPolicy::All => JoinPolicy::All,
                    AstJoinPolicy::First => JoinPolicy::First,
                    AstJoinPolicy::Any(n) => JoinPolicy::Any(*n),
                    AstJoinPolicy::Majority => JoinPolicy::Majority,
                    AstJoinPolicy::Best(expr, dir) => {
                        collect_deps(expr, bindings, &mut deps);
                        JoinPolicy::Best(Box::new((**expr).clone()), convert_dir(*dir))
                    }
                };
                let id = self.next_id("parallel");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Parallel {
                        join: join_ir,
                        branches: branch_ids,
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Pipeline { source, stages, binding } => {
                let mut deps = HashSet::new();
                collect_deps(source, bindings, &mut deps);
                let mut ir_stages = Vec::new();
                for stage in stages {
                    ir_stages.push(match stage {
                        AstPipelineStage::Where(e) => {
                            collect_deps(e, bindings, &mut deps);
                            PipelineStageIr::Where(e.clone())
                        }
                        AstPipelineStage::Sort(e, dir) => {
                            collect_deps(e, bindings, &mut deps);
                            PipelineStageIr::Sort(e.clone(), convert_dir(*dir))
                        }
                        AstPipelineStage::Map(e) => {
                            collect_deps(e, bindings, &mut deps);
                            PipelineStageIr::Map(e.clone())
                        }
                        AstPipelineStage::Take(n) => PipelineStageIr::Take(*n),
                        AstPipelineStage::Skip(n) => PipelineStageIr::Skip(*n),
                    });
                }
                let id = self.next_id("pipeline");
                if let Some(name) = binding {
                    bindings.insert(name.clone(), id.clone());
                }
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Pipeline {
                        source: Box::new(source.clone()),
                        stages: ir_stages,
                        binding: binding.clone(),
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Try { body, catches } => {
                let body_steps = self.lower_block(body, &mut bindings.clone())?;
                let mut catch_irs = Vec::new();
                for catch in catches {
                    let steps = self.lower_block(&catch.body, &mut bindings.clone())?;
                    catch_irs.push(CatchIr {
                        pattern: catch.pattern.clone(),
                        body_steps: steps,
                    });
                }
                let id = self.next_id("try");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Try {
                        body_steps,
                        catches: catch_irs,
                    },
                    depends_on: Vec::new(),
                });
                Ok(id)
            }
            StmtKind::Action {
                venue,
                method,
                args,
                on_failure,
            } => {
                let mut deps = HashSet::new();
                for arg in args {
                    collect_deps(arg, bindings, &mut deps);
                }
                let id = self.next_id("action");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Action {
                        venue: venue.clone(),
                        method: method.clone(),
                        args: args.clone(),
                        on_failure: convert_on_failure(on_failure),
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Emit { name, payload } => {
                let mut deps = HashSet::new();
                collect_deps(payload, bindings, &mut deps);
                let id = self.next_id("emit");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Emit {
                        name: name.clone(),
                        payload: payload.clone(),
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Wait { duration } => {
                let mut deps = HashSet::new();
                collect_deps(duration, bindings, &mut deps);
                let id = self.next_id("wait");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Wait {
                        duration: duration.clone(),
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Halt => {
                let id = self.next_id("halt");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Halt,
                    depends_on: Vec::new(),
                });
                Ok(id)
            }
            StmtKind::Advisory {
                advisor,
                prompt,
                timeout,
                fallback,
                skills,
                output_schema,
                output_binding,
            } => {
                let mut deps = HashSet::new();
                if let Some(t) = timeout {
                    collect_deps(t, bindings, &mut deps);
                }
                collect_deps(fallback, bindings, &mut deps);
                let id = self.next_id("advisory");
                if let Some(name) = output_binding {
                    bindings.insert(name.clone(), id.clone());
                }
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Advisory {
                        advisor: advisor.clone(),
                        prompt: prompt.clone(),
                        timeout: timeout.clone(),
                        fallback: fallback.clone(),
                        skills: skills.clone(),
                        output_schema: output_schema.clone(),
                        output_binding: output_binding.clone(),
                    },
                    depends_on: deps.into_iter().collect(),
                });
                Ok(id)
            }
            StmtKind::Atomic(body) => {
                let body_steps = self.lower_block(body, bindings)?;
                let id = self.next_id("atomic");
                self.steps.push(Step {
                    id: id.clone(),
                    kind: StepKind::Atomic { body_steps },
                    depends_on: Vec::new(),
                });
                Ok(id)
            }
            StmtKind::Let { .. } | StmtKind::Compute(_) => unreachable!("batched by lower_block"),
        }
    }
}

fn convert_dir(dir: AstSortDir) -> SortDir {
    match dir {
        AstSortDir::Asc => SortDir::Asc,
        AstSortDir::Desc => SortDir::Desc,
    }
}

fn convert_on_failure(of: &AstOnFailure) -> OnFailure {
    match of {
        AstOnFailure::Revert => OnFailure::Revert,
        AstOnFailure::Continue => OnFailure::Continue,
        AstOnFailure::Retry(n) => OnFailure::Retry(*n),
    }
}

/// Walks an expression tree collecting, for every free identifier that is
/// currently bound, the id of the step that produced it.
fn collect_deps(expr: &Expr, bindings: &HashMap<String, String>, out: &mut HashSet<String>) {
    match expr {
        Expr::Ident(name) => {
            if let Some(step_id) = bindings.get(name) {
                out.insert(step_id.clone());
            }
        }
        Expr::Unary { expr, .. } => collect_deps(expr, bindings, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_deps(lhs, bindings, out);
            collect_deps(rhs, bindings, out);
        }
        Expr::FieldAccess { base, .. } => collect_deps(base, bindings, out),
        Expr::Index { base, index } => {
            collect_deps(base, bindings, out);
            collect_deps(index, bindings, out);
        }
        Expr::Call { args, .. } => {
            for a in args {
                collect_deps(a, bindings, out);
            }
        }
        Expr::MethodCall { args, .. } => {
            for a in args {
                collect_deps(a, bindings, out);
            }
        }
        Expr::Array(items) => {
            for i in items {
                collect_deps(i, bindings, out);
            }
        }
        Expr::Object(fields) => {
            for (_, v) in fields {
                collect_deps(v, bindings, out);
            }
        }
        // Params and state variables are resolved from the run's context at
        // evaluation time, not from a prior step's output, so they add no
        // scheduling dependency.
        Expr::Param(_) | Expr::Persistent(_) | Expr::Ephemeral(_) => {}
        Expr::Null
        | Expr::Bool(_)
        | Expr::Number(_)
        | Expr::Percentage(_)
        | Expr::String(_)
        | Expr::Address(_)
        | Expr::VenueRef(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Tokenizer;
    use crate::parser::Parser;
    use crate::transformer;

    fn generate_src(src: &str) -> SpellIr {
        let tokens = Tokenizer::new(src).tokenize().unwrap();
        let outcome = Parser::new(tokens).parse();
        let source = transformer::transform(outcome.ast.unwrap()).unwrap();
        generate(source).unwrap()
    }

    #[test]
    fn consecutive_lets_batch_into_one_compute_step() {
        let src = "spell \"x\":\n  on manual:\n    let a = 1\n    let b = a + 1\n    halt\n";
        let ir = generate_src(src);
        let compute_steps = ir
            .steps
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Compute { .. }))
            .count();
        assert_eq!(compute_steps, 1);
    }

    #[test]
    fn conditional_depends_on_its_condition_binding() {
        let src = "spell \"x\":\n  on manual:\n    let a = 1\n    if a > 0:\n      halt\n";
        let ir = generate_src(src);
        let cond_step = ir
            .steps
            .iter()
            .find(|s| matches!(s.kind, StepKind::Conditional { .. }))
            .unwrap();
        assert!(!cond_step.depends_on.is_empty());
    }
}

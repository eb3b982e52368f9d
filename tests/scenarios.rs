//! End-to-end scenarios driven through program text.

use sldlog::engine::Engine;

fn engine_with(program: &str) -> Engine {
    let mut e = Engine::new().with_output(Box::new(Vec::new()));
    e.consult_str(program).expect("program should load");
    e
}

fn solutions(e: &mut Engine, query: &str) -> Vec<String> {
    e.run_query(query)
        .expect("query should not fault")
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(name, value)| format!("{} = {}", name, value))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

#[test]
fn grandparent_enumerates_in_database_order() {
    let mut e = engine_with(
        "parent(john, mary).\n\
         parent(jane, mary).\n\
         parent(mary, ann).\n\
         grandparent(X, Y) :- parent(X, Z), parent(Z, Y).",
    );
    assert_eq!(
        solutions(&mut e, "grandparent(X, ann)."),
        vec!["X = john", "X = jane"]
    );
}

#[test]
fn append_concatenates() {
    let mut e = engine_with(
        "append([], L, L).\n\
         append([H|T], L, [H|R]) :- append(T, L, R).",
    );
    assert_eq!(
        solutions(&mut e, "append([1, 2], [3], X)."),
        vec!["X = [1, 2, 3]"]
    );
}

#[test]
fn append_splits_backwards() {
    let mut e = engine_with(
        "append([], L, L).\n\
         append([H|T], L, [H|R]) :- append(T, L, R).",
    );
    assert_eq!(
        solutions(&mut e, "append(A, B, [1, 2])."),
        vec![
            "A = [], B = [1, 2]",
            "A = [1], B = [2]",
            "A = [1, 2], B = []"
        ]
    );
}

#[test]
fn arithmetic_tower() {
    let mut e = engine_with("");
    assert_eq!(solutions(&mut e, "X is 7 / 2."), vec!["X = 3.5"]);
    assert_eq!(solutions(&mut e, "X is 7 // 2."), vec!["X = 3"]);
    assert_eq!(solutions(&mut e, "X is 7 mod 3."), vec!["X = 1"]);
    assert_eq!(solutions(&mut e, "X is 1.0Inf + 1."), vec!["X = 1.0Inf"]);
}

#[test]
fn special_float_spellings_survive_a_round_trip() {
    let mut e = engine_with("");
    assert_eq!(solutions(&mut e, "X is inf + 1."), vec!["X = 1.0Inf"]);
    assert_eq!(
        solutions(&mut e, "X is - 1.0Inf - 1."),
        vec!["X = -1.0Inf"]
    );
    assert_eq!(solutions(&mut e, "X is 1.5NaN * 2."), vec!["X = 1.5NaN"]);
}

#[test]
fn cut_commits_max() {
    let mut e = engine_with(
        "max(X, Y, X) :- X >= Y, !.\n\
         max(_, Y, Y).",
    );
    assert_eq!(solutions(&mut e, "max(3, 7, Z)."), vec!["Z = 7"]);
    assert_eq!(solutions(&mut e, "max(9, 2, Z)."), vec!["Z = 9"]);
}

#[test]
fn dcg_recognizes_sentences() {
    let mut e = engine_with(
        "s --> np, vp.\n\
         np --> [the], [cat].\n\
         vp --> [sleeps].",
    );
    assert_eq!(
        solutions(&mut e, "phrase(s, [the, cat, sleeps])."),
        vec![""],
        "one success with no bindings"
    );
    assert!(solutions(&mut e, "phrase(s, [the, cat, runs]).").is_empty());
}

#[test]
fn dcg_round_trips_with_direct_call() {
    let mut e = engine_with(
        "greeting --> [hello], [world].\n\
         ok1 :- phrase(greeting, [hello, world]).\n\
         ok2 :- greeting([hello, world], []).",
    );
    assert_eq!(solutions(&mut e, "ok1."), vec![""]);
    assert_eq!(solutions(&mut e, "ok2."), vec![""]);
}

#[test]
fn distinct_deduplicates() {
    let mut e = engine_with("p(1). p(2). p(1).");
    assert_eq!(
        solutions(&mut e, "distinct(X, p(X))."),
        vec!["X = 1", "X = 2"]
    );
}

#[test]
fn negation_and_if_then_else_cooperate() {
    let mut e = engine_with(
        "likes(mary, wine).\n\
         likes(john, beer).\n\
         prefers(P, D) :- likes(P, D), \\+ D = water.",
    );
    assert_eq!(
        solutions(&mut e, "prefers(mary, D)."),
        vec!["D = wine"]
    );
    assert_eq!(
        solutions(&mut e, "(likes(mary, beer) -> X = yes ; X = no)."),
        vec!["X = no"]
    );
}

#[test]
fn brace_goals_run_inside_grammars() {
    let mut e = engine_with(
        "digit(D) --> [D], {D >= 0, D =< 9}.\n\
         digits([D|T]) --> digit(D), digits(T).\n\
         digits([D]) --> digit(D).",
    );
    assert_eq!(
        solutions(&mut e, "phrase(digits(L), [1, 2, 3])."),
        vec!["L = [1, 2, 3]"]
    );
    assert!(solutions(&mut e, "phrase(digits(L), [1, 77]).").is_empty());
}

#[test]
fn solutions_follow_backtracking_order() {
    let mut e = engine_with(
        "color(red). color(green).\n\
         size(small). size(big).\n\
         item(C, S) :- color(C), size(S).",
    );
    assert_eq!(
        solutions(&mut e, "item(C, S)."),
        vec![
            "C = red, S = small",
            "C = red, S = big",
            "C = green, S = small",
            "C = green, S = big"
        ]
    );
}

#[test]
fn recursive_list_sum_with_accumulator() {
    let mut e = engine_with(
        "sum([], Acc, Acc).\n\
         sum([H|T], Acc, S) :- Acc2 is Acc + H, sum(T, Acc2, S).",
    );
    assert_eq!(solutions(&mut e, "sum([1, 2, 3, 4], 0, S)."), vec!["S = 10"]);
}

#[test]
fn repeat_cut_yields_once() {
    let mut e = engine_with("");
    assert_eq!(solutions(&mut e, "repeat, !."), vec![""]);
}

#[test]
fn format_writes_through_the_engine_sink() {
    // The sink is captured per engine; this exercises the built-in path
    // end to end without inspecting the buffer (covered in unit tests).
    let mut e = engine_with("");
    assert_eq!(
        solutions(&mut e, "format(\"~w~n\", [ok])."),
        vec![""]
    );
}

#[test]
fn depth_guard_reports_runaway_programs() {
    let mut e = engine_with("loop :- loop.");
    assert!(matches!(
        e.run_query("loop."),
        Err(sldlog::engine::LoadError::Engine(
            sldlog::error::Error::DepthExceeded
        ))
    ));
}

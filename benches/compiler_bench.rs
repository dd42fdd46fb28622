use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tova_compiler::{compile_front, lex, parse};

const SOURCE: &str = r#"
type Todo {
    id: Int,
    title: String,
    done: Bool
}

server api {
    db todos

    fn list(req) {
        [t for t in todos.all() if not t.done]
    }

    route GET "/todos" => list
    route POST "/todos" body Todo => fn(req) req.body
}

browser {
    state filter = "all"
    state items = []
    computed heading = "Todos ({filter})"

    component TodoList(items) {
        <ul>
            for item in items {
                <li class:done={item.done}>{item.title}</li>
            }
        </ul>
    }
}
"#;

fn bench_lexer(c: &mut Criterion) {
    c.bench_function("lex", |b| {
        b.iter(|| lex(black_box(SOURCE), "bench.tova").unwrap())
    });
}

fn bench_parser(c: &mut Criterion) {
    let tokens = lex(SOURCE, "bench.tova").unwrap();
    c.bench_function("parse", |b| {
        b.iter(|| parse(black_box(tokens.clone()), "bench.tova").unwrap())
    });
}

fn bench_front_end(c: &mut Criterion) {
    c.bench_function("compile_front", |b| {
        b.iter(|| compile_front(black_box(SOURCE), "bench.tova").unwrap())
    });
}

criterion_group!(benches, bench_lexer, bench_parser, bench_front_end);
criterion_main!(benches);

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wires a greeter with a sink dependency and a constant prefix.

use std::sync::Arc;

use wirework::Resolver;

#[wirework::module]
mod app {
    use std::sync::Arc;

    pub trait Sink: Send + Sync {
        fn write(&self, line: &str);
    }

    pub trait Greeter: Send + Sync {
        fn greet(&self, name: &str);
    }

    pub struct ConsoleSink;

    impl ConsoleSink {
        pub fn new() -> Self {
            Self
        }
    }

    impl Sink for ConsoleSink {
        fn write(&self, line: &str) {
            println!("{line}");
        }
    }

    pub struct ConsoleGreeter {
        prefix: String,
        sink: Arc<dyn Sink>,
    }

    impl ConsoleGreeter {
        pub fn new(prefix: String, sink: Arc<dyn Sink>) -> Self {
            Self { prefix, sink }
        }
    }

    impl Greeter for ConsoleGreeter {
        fn greet(&self, name: &str) {
            self.sink.write(&format!("{} {name}", self.prefix));
        }
    }

    fn services() {
        register_constant::<String>(String::from("hello,"));
        register::<dyn Sink, ConsoleSink>();
        register::<dyn Greeter, ConsoleGreeter>();
    }
}

fn main() {
    let resolver = Resolver::new();
    app::wire(&resolver);

    let greeter = resolver
        .resolve_one::<Arc<dyn app::Greeter>>(None)
        .expect("the wiring registered a greeter");
    greeter.greet("wirework");
}

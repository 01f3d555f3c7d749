//! Demonstrates the callback list and keyed dispatch: registration order, handles,
//! removal, and per-key routing.

use events_bus::{CallbackList, EventDispatcher, InsertOrder};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
enum Topic {
    Started,
    Finished,
}

fn main() {
    // A plain callback list: every callback sees every invocation.
    let list = CallbackList::<String>::new();

    let greeter = list.append(|name: &String| println!("hello, {name}"));
    list.append(|name: &String| println!("nice to meet you, {name}"));
    list.insert(
        |name: &String| println!("({name} walked in)"),
        &greeter,
        InsertOrder::Before,
    );

    println!("--- invoking the list ---");
    list.invoke(&"alice".to_string());

    list.remove(&greeter);
    println!("--- after removing the greeter ---");
    list.invoke(&"bob".to_string());

    // A dispatcher routes by key: listeners only see their own topic.
    let dispatcher = EventDispatcher::<Topic, u32>::new();

    dispatcher.append_listener(Topic::Started, |job: &u32| {
        println!("job {job} started");
    });
    dispatcher.append_listener(Topic::Finished, |job: &u32| {
        println!("job {job} finished");
    });
    dispatcher.append_listener_with_key(Topic::Finished, |topic, job| {
        println!("audit: {topic:?} for job {job}");
    });

    println!("--- dispatching ---");
    dispatcher.dispatch(&Topic::Started, &7);
    dispatcher.dispatch(&Topic::Finished, &7);
}

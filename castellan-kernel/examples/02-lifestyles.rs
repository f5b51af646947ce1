// note: this example assumes you've analyzed the previous one

use castellan_kernel::component_model::dependency::ConstructorCandidate;
use castellan_kernel::component_model::lifecycle::{DecommissionConcern, Disposable};
use castellan_kernel::component_model::{ComponentModel, Lifestyle};
use castellan_kernel::kernel::KernelBuilder;
use std::sync::Arc;

#[derive(Default)]
struct Connection;

impl Disposable for Connection {
    fn dispose(&self) {
        println!("Closing connection.");
    }
}

fn main() {
    let kernel = KernelBuilder::new().build();

    // singletons are shared, transient components are created on every request
    kernel
        .register(
            ComponentModel::of::<Connection>("connection")
                .with_lifestyle(Lifestyle::Transient)
                .with_constructor(ConstructorCandidate::default_of::<Connection>())
                // concerns run when an instance is destroyed
                .with_decommission(DecommissionConcern::dispose::<Connection>()),
        )
        .expect("error registering Connection");

    let first = kernel
        .resolve::<Connection>()
        .expect("error creating Connection");
    let second = kernel
        .resolve::<Connection>()
        .expect("error creating Connection");

    // prints "false"
    println!("{}", Arc::ptr_eq(&first, &second));

    // instances needing cleanup are tracked until released
    // prints "Closing connection."
    kernel.release(&first);

    // the rest is released when the kernel is disposed or dropped
    // prints "Closing connection."
    drop(kernel);
}

use castellan_kernel::component::{instance_address, InstanceBox, ServiceType};
use castellan_kernel::component_model::configuration::Configuration;
use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan_kernel::component_model::{ComponentModel, Lifestyle};
use castellan_kernel::context::{Arguments, DEFAULT_MAX_DEPTH};
use castellan_kernel::error::ResolutionError;
use castellan_kernel::handler::HandlerState;
use castellan_kernel::kernel::{KernelBuilder, KernelConfig};
use castellan_kernel::service_alias;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

#[derive(Default)]
struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self) -> String {
        "Hello".to_string()
    }
}

service_alias!(EnglishGreeter => dyn Greeter);

struct Greeting {
    greeter: Arc<dyn Greeter>,
    name: Option<String>,
}

impl Greeting {
    fn text(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.greeter.greet(), name),
            None => self.greeter.greet(),
        }
    }
}

fn greeter_model() -> ComponentModel {
    ComponentModel::new::<dyn Greeter, EnglishGreeter>("greeter")
        .with_constructor(ConstructorCandidate::default_of::<EnglishGreeter>())
}

fn greeting_model() -> ComponentModel {
    ComponentModel::of::<Greeting>("greeting")
        .with_lifestyle(Lifestyle::Transient)
        .with_constructor(
            ConstructorCandidate::new(|arguments| {
                Ok(Box::new(Greeting {
                    greeter: arguments.service::<dyn Greeter>(0)?,
                    name: None,
                }) as InstanceBox)
            })
            .with_dependency(DependencyModel::service::<dyn Greeter>()),
        )
        .with_constructor(
            ConstructorCandidate::new(|arguments| {
                Ok(Box::new(Greeting {
                    greeter: arguments.service::<dyn Greeter>(0)?,
                    name: Some(arguments.value::<String>(1)?),
                }) as InstanceBox)
            })
            .with_dependency(DependencyModel::service::<dyn Greeter>())
            .with_dependency(DependencyModel::parameter::<String, _>("name")),
        )
}

#[test]
fn should_resolve_trait_services() {
    let kernel = KernelBuilder::new().build();
    kernel.register(greeter_model()).unwrap();
    kernel.register(greeting_model()).unwrap();

    let greeting = kernel.resolve::<Greeting>().unwrap();
    assert_eq!(greeting.text(), "Hello");

    let greeter = kernel.resolve::<dyn Greeter>().unwrap();
    assert_eq!(
        instance_address(&greeting.greeter),
        instance_address(&greeter)
    );
}

#[test]
fn should_select_greediest_satisfiable_constructor() {
    let kernel = KernelBuilder::new().build();
    kernel.register(greeter_model()).unwrap();
    kernel.register(greeting_model()).unwrap();

    let greeting = kernel
        .resolve_with::<Greeting>(Arguments::new().with_named("name", "World".to_string()))
        .unwrap();
    assert_eq!(greeting.text(), "Hello World");

    let greeting = kernel
        .resolve_with::<Greeting>(Arguments::new().with_named("other", "World".to_string()))
        .unwrap();
    assert_eq!(greeting.text(), "Hello");
}

#[test]
fn should_prefer_configured_parameters() {
    let kernel = KernelBuilder::new().build();
    kernel.register(greeter_model()).unwrap();
    kernel
        .register(
            greeting_model().with_configuration(Configuration::with_parameters(
                "greeting",
                [("name", "Config")],
            )),
        )
        .unwrap();

    assert_eq!(kernel.resolve::<Greeting>().unwrap().text(), "Hello Config");
}

struct Endpoint {
    address: Ipv4Addr,
    port: u16,
}

fn endpoint_model() -> ComponentModel {
    ComponentModel::of::<Endpoint>("endpoint").with_constructor(
        ConstructorCandidate::new(|arguments| {
            Ok(Box::new(Endpoint {
                address: arguments.value::<Ipv4Addr>(0)?,
                port: arguments.value::<u16>(1)?,
            }) as InstanceBox)
        })
        .with_dependency(DependencyModel::parameter::<Ipv4Addr, _>("address"))
        .with_dependency(DependencyModel::parameter::<u16, _>("port").with_default(8080u16)),
    )
}

#[test]
fn should_convert_textual_parameters() {
    let kernel = KernelBuilder::new().build();
    kernel
        .register(
            endpoint_model().with_configuration(Configuration::with_parameters(
                "endpoint",
                [("address", "10.0.0.1")],
            )),
        )
        .unwrap();

    assert_eq!(
        kernel.handler("endpoint").unwrap().current_state(),
        HandlerState::WaitingDependency
    );

    kernel.add_converter::<Ipv4Addr>();

    assert_eq!(
        kernel.handler("endpoint").unwrap().current_state(),
        HandlerState::Valid
    );

    let endpoint = kernel.resolve::<Endpoint>().unwrap();
    assert_eq!(endpoint.address, Ipv4Addr::new(10, 0, 0, 1));
    assert_eq!(endpoint.port, 8080);

    let endpoint = kernel
        .resolve_named_with::<Endpoint>(
            "endpoint",
            Arguments::new().with_named("port", "9090".to_string()),
        )
        .unwrap();
    // singleton, created by the first resolution
    assert_eq!(endpoint.port, 8080);
}

#[test]
fn should_override_services_by_name() {
    #[derive(Default)]
    struct FrenchGreeter;

    impl Greeter for FrenchGreeter {
        fn greet(&self) -> String {
            "Bonjour".to_string()
        }
    }

    service_alias!(FrenchGreeter => dyn Greeter);

    let kernel = KernelBuilder::new().build();
    kernel.register(greeter_model()).unwrap();
    kernel
        .register(
            ComponentModel::new::<dyn Greeter, FrenchGreeter>("french")
                .with_constructor(ConstructorCandidate::default_of::<FrenchGreeter>()),
        )
        .unwrap();

    kernel
        .register(
            ComponentModel::of::<Greeting>("configured")
                .with_constructor(
                    ConstructorCandidate::new(|arguments| {
                        Ok(Box::new(Greeting {
                            greeter: arguments.service::<dyn Greeter>(0)?,
                            name: None,
                        }) as InstanceBox)
                    })
                    .with_dependency(DependencyModel::service::<dyn Greeter>().with_key("greeter")),
                )
                .with_configuration(Configuration::with_parameters(
                    "configured",
                    [("greeter", "${french}")],
                )),
        )
        .unwrap();

    kernel
        .register(
            ComponentModel::of::<String>("overridden").with_constructor(
                ConstructorCandidate::new(|arguments| {
                    Ok(Box::new(arguments.service::<dyn Greeter>(0)?.greet()) as InstanceBox)
                })
                .with_dependency(DependencyModel::service_override::<dyn Greeter, _>("french")),
            ),
        )
        .unwrap();

    assert_eq!(kernel.resolve::<dyn Greeter>().unwrap().greet(), "Hello");
    assert_eq!(kernel.resolve::<Greeting>().unwrap().text(), "Bonjour");
    assert_eq!(*kernel.resolve::<String>().unwrap(), "Bonjour");
    assert_eq!(kernel.resolve_all::<dyn Greeter>().unwrap().len(), 2);
}

#[test]
fn should_share_instance_between_forwarded_services() {
    let kernel = KernelBuilder::new().build();
    kernel
        .register(greeter_model().with_forwarded_service::<EnglishGreeter, EnglishGreeter>())
        .unwrap();

    let greeter = kernel.resolve::<dyn Greeter>().unwrap();
    let english = kernel.resolve::<EnglishGreeter>().unwrap();

    assert_eq!(instance_address(&greeter), instance_address(&english));
    assert!(kernel.resolve_named::<EnglishGreeter>("greeter").is_ok());
}

trait Anchor: Send + Sync {
    fn id(&self) -> u8;
}

struct Head {
    tail: Arc<Tail>,
}

impl Anchor for Head {
    fn id(&self) -> u8 {
        self.tail.anchor.id() + 1
    }
}

service_alias!(Head => dyn Anchor);

struct Tail {
    anchor: Arc<dyn Anchor>,
}

struct FixedAnchor;

impl Anchor for FixedAnchor {
    fn id(&self) -> u8 {
        10
    }
}

fn register_cycle(kernel: &castellan_kernel::kernel::Kernel) {
    kernel
        .register(
            ComponentModel::new::<dyn Anchor, Head>("head")
                .with_lifestyle(Lifestyle::Transient)
                .with_constructor(
                    ConstructorCandidate::new(|arguments| {
                        Ok(Box::new(Head {
                            tail: arguments.service::<Tail>(0)?,
                        }) as InstanceBox)
                    })
                    .with_dependency(DependencyModel::service::<Tail>()),
                ),
        )
        .unwrap();

    kernel
        .register(
            ComponentModel::of::<Tail>("tail")
                .with_lifestyle(Lifestyle::Transient)
                .with_constructor(
                    ConstructorCandidate::new(|arguments| {
                        Ok(Box::new(Tail {
                            anchor: arguments.service::<dyn Anchor>(0)?,
                        }) as InstanceBox)
                    })
                    .with_dependency(DependencyModel::service::<dyn Anchor>()),
                ),
        )
        .unwrap();
}

#[test]
fn should_detect_circular_dependencies() {
    let kernel = KernelBuilder::new().build();
    register_cycle(&kernel);

    match kernel.resolve::<dyn Anchor>() {
        Err(ResolutionError::CircularDependency { component, path }) => {
            assert_eq!(component, "head");
            assert_eq!(path, vec!["head", "tail", "head"]);
        }
        other => panic!("Unexpected result: {:?}", other.map(|anchor| anchor.id())),
    }
}

#[test]
fn should_break_cycles_with_propagated_arguments() {
    let kernel = KernelBuilder::new()
        .with_config(KernelConfig {
            max_resolution_depth: 16,
            ..Default::default()
        })
        .build();
    register_cycle(&kernel);

    let service = ServiceType::of::<dyn Anchor>();
    let arguments = Arguments::new().with_shared::<dyn Anchor>(Arc::new(FixedAnchor));

    // hidden from nested resolutions by default
    let mut context = kernel.create_context().with_arguments(arguments.clone());
    assert!(matches!(
        kernel.resolve_service(&service, &mut context),
        Err(ResolutionError::CircularDependency { .. })
    ));

    let mut context = kernel
        .create_context()
        .with_arguments(arguments)
        .with_propagated_arguments(true);
    let anchor = kernel
        .resolve_service(&service, &mut context)
        .unwrap()
        .downcast::<dyn Anchor>()
        .unwrap();
    assert_eq!(anchor.id(), 11);

    let mut context = kernel
        .create_context()
        .with_arguments(Arguments::new().with_named("unrelated", 1u8))
        .with_propagated_arguments(true);
    assert!(matches!(
        kernel.resolve_service(&service, &mut context),
        Err(ResolutionError::DepthExceeded { max_depth: 16, .. })
    ));
}

#[test]
fn should_stop_propagated_cycles_within_default_stack() {
    let result = thread::spawn(|| {
        let kernel = KernelBuilder::new().build();
        register_cycle(&kernel);

        let mut context = kernel
            .create_context()
            .with_arguments(Arguments::new().with_named("unrelated", 1u8))
            .with_propagated_arguments(true);
        matches!(
            kernel.resolve_service(&ServiceType::of::<dyn Anchor>(), &mut context),
            Err(ResolutionError::DepthExceeded { max_depth, .. }) if max_depth == DEFAULT_MAX_DEPTH
        )
    })
    .join()
    .unwrap();

    assert!(result);
}

struct Report {
    greeter: Arc<dyn Greeter>,
}

fn report_model() -> ComponentModel {
    ComponentModel::of::<Report>("report")
        .with_lifestyle(Lifestyle::Transient)
        .with_constructor(
            ConstructorCandidate::new(|arguments| {
                Ok(Box::new(Report {
                    greeter: arguments.service::<dyn Greeter>(0)?,
                }) as InstanceBox)
            })
            .with_dependency(DependencyModel::service::<dyn Greeter>()),
        )
}

#[test]
fn should_build_waiting_component_from_covering_arguments() {
    let kernel = KernelBuilder::new().build();
    kernel.register(report_model()).unwrap();

    assert_eq!(
        kernel.handler("report").unwrap().current_state(),
        HandlerState::WaitingDependency
    );

    let report = kernel
        .resolve_with::<Report>(
            Arguments::new().with_shared::<dyn Greeter>(Arc::new(EnglishGreeter)),
        )
        .unwrap();
    assert_eq!(report.greeter.greet(), "Hello");

    assert_eq!(
        kernel.handler("report").unwrap().current_state(),
        HandlerState::WaitingDependency
    );
}

#[test]
fn should_keep_waiting_component_with_unrelated_arguments() {
    let kernel = KernelBuilder::new().build();
    kernel.register(report_model()).unwrap();

    assert!(matches!(
        kernel.resolve::<Report>(),
        Err(ResolutionError::WaitingDependency { .. })
    ));
    assert!(matches!(
        kernel.resolve_with::<Report>(Arguments::new().with_named("other", "Hi".to_string())),
        Err(ResolutionError::WaitingDependency { .. })
    ));
}

#[test]
fn should_register_concurrently() {
    let kernel = KernelBuilder::new().build();

    thread::scope(|scope| {
        for index in 0..8u32 {
            let kernel = &kernel;
            scope.spawn(move || {
                kernel
                    .register_instance::<u32, _>(format!("number-{index}"), Arc::new(index))
                    .unwrap();
            });
        }
    });

    let mut numbers = kernel
        .resolve_all::<u32>()
        .unwrap()
        .into_iter()
        .map(|number| *number)
        .collect::<Vec<_>>();
    numbers.sort_unstable();

    assert_eq!(numbers, (0..8).collect::<Vec<_>>());
}

#[test]
fn should_keep_singleton_across_threads() {
    let kernel = KernelBuilder::new().build();
    kernel.register(greeter_model()).unwrap();

    let kernel = &kernel;
    let addresses = thread::scope(|scope| {
        let handles = (0..4)
            .map(move |_| {
                scope.spawn(move || instance_address(&kernel.resolve::<dyn Greeter>().unwrap()))
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn should_separate_per_thread_instances() {
    let kernel = KernelBuilder::new().build();
    kernel
        .register(
            ComponentModel::of::<EnglishGreeter>("greeter")
                .with_lifestyle(Lifestyle::PerThread)
                .with_constructor(ConstructorCandidate::default_of::<EnglishGreeter>()),
        )
        .unwrap();

    let first = kernel.resolve::<EnglishGreeter>().unwrap();
    let second = kernel.resolve::<EnglishGreeter>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = thread::scope(|scope| {
        scope
            .spawn(|| instance_address(&kernel.resolve::<EnglishGreeter>().unwrap()))
            .join()
            .unwrap()
    });
    assert_ne!(other, instance_address(&first));
}

#[derive(Default)]
struct Class1;

struct DependentOnClass1 {
    dependency: Arc<Class1>,
}

#[test]
fn should_validate_regardless_of_concurrent_registration_order() {
    for round in 0..16 {
        let kernel = KernelBuilder::new().build();
        let register_class = || {
            kernel
                .register(
                    ComponentModel::of::<Class1>("class1")
                        .with_lifestyle(Lifestyle::Transient)
                        .with_constructor(ConstructorCandidate::default_of::<Class1>()),
                )
                .unwrap();
        };
        let register_dependent = || {
            kernel
                .register(
                    ComponentModel::of::<DependentOnClass1>("dependent")
                        .with_lifestyle(Lifestyle::Transient)
                        .with_constructor(
                            ConstructorCandidate::new(|arguments| {
                                Ok(Box::new(DependentOnClass1 {
                                    dependency: arguments.service::<Class1>(0)?,
                                }) as InstanceBox)
                            })
                            .with_dependency(DependencyModel::service::<Class1>()),
                        ),
                )
                .unwrap();
        };

        thread::scope(|scope| {
            if round % 2 == 0 {
                scope.spawn(register_class);
                thread::yield_now();
                scope.spawn(register_dependent);
            } else {
                scope.spawn(register_dependent);
                thread::yield_now();
                scope.spawn(register_class);
            }
        });

        let first = kernel.resolve::<DependentOnClass1>().unwrap();
        let second = kernel.resolve::<DependentOnClass1>().unwrap();
        assert_ne!(
            instance_address(&first.dependency),
            instance_address(&second.dependency)
        );
        assert!(kernel.waiting_components().is_empty());
    }
}

//! Example demonstrating upcasts and checked downcasts with `Shared<T>`.
//!
//! A collection of `Shared<dyn Shape>` handles co-owns shapes of different concrete types,
//! and individual shapes are recovered by their concrete type when needed.

use shared_handle::{Shared, define_shared_dyn_cast, dynamic_cast, try_dynamic_cast};

trait Shape {
    fn area(&self) -> f64;
}

struct Rectangle {
    width: f64,
    height: f64,
}

impl Shape for Rectangle {
    fn area(&self) -> f64 {
        self.width * self.height
    }
}

struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

define_shared_dyn_cast!(Shape);

fn main() {
    println!("=== Shared: Upcasts and Downcasts ===");

    let rectangle = Shared::new(Rectangle {
        width: 2.0,
        height: 3.0,
    });

    // Upcasting a clone keeps the original handle usable as a `Shared<Rectangle>`.
    let shapes: Vec<Shared<dyn Shape>> = vec![
        rectangle.clone().cast_shape(),
        Shared::new(Circle { radius: 1.0 }).cast_shape(),
    ];

    println!("Rectangle owners: {}", rectangle.shared_count());

    for shape in &shapes {
        println!("Area: {:.2}", shape.area());

        match try_dynamic_cast::<Circle, _>(shape) {
            Ok(circle) => println!("  this is a circle with radius {}", circle.radius),
            Err(error) => println!("  not a circle: {error}"),
        }
    }

    // A failed dynamic cast still co-owns the shape but cannot observe it.
    let not_a_circle = dynamic_cast::<Circle, _>(&shapes[0]);
    println!("Failed cast is live: {}", not_a_circle.is_live());
    println!("Rectangle owners: {}", rectangle.shared_count());

    drop(not_a_circle);
    drop(shapes);

    println!("Rectangle owners: {}", rectangle.shared_count());
}

//! Basic example showing how to encode an object graph

use objstream::{
    write_stream, ClassDescriptor, FieldDescriptor, ObjectValue, PrimitiveType, Value,
};
use std::rc::Rc;

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== objstream example ===\n");

    // Example 1: primitives inside an object
    println!("Example 1: A simple object");
    {
        let point = Rc::new(ClassDescriptor::new(
            "Point",
            1,
            vec![
                FieldDescriptor::primitive("x", PrimitiveType::Int),
                FieldDescriptor::primitive("y", PrimitiveType::Int),
            ],
        ));
        let value = Value::Object(Rc::new(
            ObjectValue::new(point)
                .field("x", Value::Int(3))
                .field("y", Value::Int(4)),
        ));

        let mut buffer = Vec::new();
        write_stream(&[value], &mut buffer).await?;
        println!("  {} bytes: {}\n", buffer.len(), hex(&buffer));
    }

    // Example 2: a shared value encodes once, then by reference
    println!("Example 2: Shared values become back-references");
    {
        let holder = Rc::new(ClassDescriptor::new(
            "Holder",
            2,
            vec![
                FieldDescriptor::object("first", "Ljava/lang/String;"),
                FieldDescriptor::object("second", "Ljava/lang/String;"),
            ],
        ));
        let value = Value::Object(Rc::new(
            ObjectValue::new(holder)
                .field("first", Value::string("shared"))
                .field("second", Value::string("shared")),
        ));

        let mut buffer = Vec::new();
        write_stream(&[value], &mut buffer).await?;
        println!("  {} bytes: {}\n", buffer.len(), hex(&buffer));
    }

    // Example 3: a two-level class hierarchy
    println!("Example 3: Inheritance writes slot data root-first");
    {
        let base = Rc::new(ClassDescriptor::new(
            "Shape",
            3,
            vec![FieldDescriptor::primitive("id", PrimitiveType::Int)],
        ));
        let circle = Rc::new(
            ClassDescriptor::new(
                "Circle",
                4,
                vec![FieldDescriptor::primitive("radius", PrimitiveType::Int)],
            )
            .with_super(base),
        );
        let value = Value::Object(Rc::new(
            ObjectValue::new(circle)
                .field("id", Value::Int(7))
                .field("radius", Value::Int(12)),
        ));

        let mut buffer = Vec::new();
        write_stream(&[value], &mut buffer).await?;
        println!("  {} bytes: {}\n", buffer.len(), hex(&buffer));
    }

    println!("All examples completed successfully!");
    Ok(())
}

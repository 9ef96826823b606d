use std::io;


error_chain! {
    foreign_links {
        Io(io::Error);
        MalformedJson(serde_json::Error);
    }

    errors {
        UnsupportedVersion(found: i64) {
            description("Unsupported source map version")
            display("unsupported source map version {} (only version 3 is supported)", found)
        }
        InvalidFieldShape(field: String) {
            description("Source map field has the wrong shape")
            display("invalid value for field \"{}\"", field)
        }
        InvalidVlqCharacter(offset: usize) {
            description("Invalid character in VLQ data")
            display("invalid VLQ data at index {}: invalid character", offset)
        }
        UnexpectedEndOfData(offset: usize) {
            description("VLQ data ended in the middle of a value")
            display("invalid VLQ data at index {}: expected extra data", offset)
        }
        VlqOverflow(offset: usize) {
            description("VLQ value does not fit in 32 bits")
            display("invalid VLQ data at index {}: value out of range", offset)
        }
        IndexOutOfRange(what: &'static str, offset: usize) {
            description("Mapping references an undeclared source or name")
            display("invalid VLQ data at index {}: {} index out of range", offset, what)
        }
        NegativePosition(what: &'static str, offset: usize) {
            description("Mapping position became negative")
            display("invalid VLQ data at index {}: invalid {}", offset, what)
        }
        TrailingSegmentData(offset: usize) {
            description("Mapping segment has too many fields")
            display("invalid VLQ data at index {}: invalid character after mapping", offset)
        }
        InvalidSectionOffset(section: usize) {
            description("Index map section has a bad offset")
            display("section {} has an invalid offset", section)
        }
        Cancelled {
            description("Decoding was cancelled")
        }
    }
}

//! HTML output formatter

use mdxpad_core::VisibleOutput;

pub fn output_html(output: &VisibleOutput) {
    if let VisibleOutput::Document { tree } = output {
        println!("{}", tree.to_html());
    }
}

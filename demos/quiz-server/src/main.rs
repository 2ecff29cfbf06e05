use quizhive::prelude::*;

// ---------------------------------------------------------------------------
// Question bank
// ---------------------------------------------------------------------------

fn question(
    id: u64,
    prompt: &str,
    options: [&str; 4],
    correct_index: usize,
) -> Question {
    Question {
        id,
        prompt: prompt.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_index,
    }
}

/// A small bundled trivia set so the demo runs without any backend.
fn general_knowledge() -> Vec<Question> {
    vec![
        question(
            1,
            "What is the largest planet in the solar system?",
            ["Saturn", "Jupiter", "Neptune", "Earth"],
            1,
        ),
        question(
            2,
            "Which element has the chemical symbol 'O'?",
            ["Gold", "Osmium", "Oxygen", "Oganesson"],
            2,
        ),
        question(
            3,
            "In which year did the first human walk on the Moon?",
            ["1959", "1965", "1969", "1972"],
            2,
        ),
        question(
            4,
            "What is the capital of Australia?",
            ["Sydney", "Melbourne", "Perth", "Canberra"],
            3,
        ),
        question(
            5,
            "How many strings does a standard violin have?",
            ["4", "5", "6", "7"],
            0,
        ),
        question(
            6,
            "Which ocean is the deepest?",
            ["Atlantic", "Indian", "Pacific", "Arctic"],
            2,
        ),
        question(
            7,
            "Who painted the Mona Lisa?",
            ["Michelangelo", "Leonardo da Vinci", "Raphael", "Donatello"],
            1,
        ),
        question(
            8,
            "What is the smallest prime number?",
            ["0", "1", "2", "3"],
            2,
        ),
        question(
            9,
            "Which country has the most time zones?",
            ["Russia", "USA", "China", "France"],
            3,
        ),
        question(
            10,
            "What gas do plants absorb from the atmosphere?",
            ["Oxygen", "Nitrogen", "Carbon dioxide", "Hydrogen"],
            2,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), QuizHiveError> {
    init_tracing();

    let services = Services {
        questions: StaticQuestionSource::new()
            .with_set("general", general_knowledge()),
        hall_of_fame: NullHallOfFame,
        profiles: NullProfileService,
    };

    let server = QuizHiveServerBuilder::new()
        .bind("0.0.0.0:8080")
        .build(GuestAuthenticator::new(), services)
        .await?;

    server.run().await
}

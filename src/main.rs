#[rocket::launch]
fn rocket() -> _ {
    todo_api::rocket()
}
